//! Template types for typed variable injection.

use std::marker::PhantomData;

/// Trait for template variable sets
pub trait TemplateVars {
    fn apply(&self, content: &str) -> String;
}

/// Template with typed variable injection
#[derive(Debug, Clone, Copy)]
pub struct Template<V> {
    content: &'static str,
    _marker: PhantomData<V>,
}

impl<V> Template<V> {
    pub const fn new(content: &'static str) -> Self {
        Self {
            content,
            _marker: PhantomData,
        }
    }

    pub const fn content(&self) -> &'static str {
        self.content
    }
}

impl<V: TemplateVars> Template<V> {
    pub fn render(&self, vars: &V) -> String {
        vars.apply(self.content)
    }
}

/// Encode a value as a JavaScript literal (JSON is a JS subset here).
///
/// `<` is escaped so the literal can never close an enclosing `<script>`.
pub fn js_literal(value: &str) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| "\"\"".into())
        .replace('<', "\\u003c")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Greeting<'a> {
        name: &'a str,
    }

    impl TemplateVars for Greeting<'_> {
        fn apply(&self, content: &str) -> String {
            content.replace("__NAME__", self.name)
        }
    }

    #[test]
    fn test_render_replaces_placeholders() {
        const HELLO: Template<Greeting<'static>> = Template::new("hello __NAME__");
        assert_eq!(HELLO.render(&Greeting { name: "guest" }), "hello guest");
        assert_eq!(HELLO.content(), "hello __NAME__");
    }

    #[test]
    fn test_js_literal_escapes() {
        assert_eq!(js_literal("abc"), "\"abc\"");
        assert_eq!(js_literal("a\"b"), "\"a\\\"b\"");
        assert_eq!(js_literal("</script>"), "\"\\u003c/script>\"");
    }
}
