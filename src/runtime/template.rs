//! Small helpers for assembling generated JavaScript

/// Code assembly helpers
pub struct Template;

impl Template {
    /// Join lines with newlines
    pub fn as_string<S: AsRef<str>>(lines: &[S]) -> String {
        lines
            .iter()
            .map(|line| line.as_ref())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Indent every non-empty line of a block by one tab
    pub fn indent(code: &str) -> String {
        code.lines()
            .map(|line| {
                if line.is_empty() {
                    String::new()
                } else {
                    format!("\t{}", line)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Serialize a string as a JavaScript string literal
    pub fn string_literal(value: &str) -> String {
        serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value))
    }

    /// `<object>[<"key">]` property access with a serialized key
    pub fn property_access(object: &str, key: &str) -> String {
        format!("{}[{}]", object, Self::string_literal(key))
    }

    /// Turn a filename template into a string-concatenation expression
    ///
    /// Each `(placeholder, expression)` pair splices a runtime expression in
    /// place of the placeholder; everything else stays literal.
    pub fn filename_expr(template: &str, substitutions: &[(&str, &str)]) -> String {
        let mut parts: Vec<String> = Vec::new();
        let mut literal = String::new();
        let mut rest = template;

        'outer: while !rest.is_empty() {
            for (placeholder, expr) in substitutions {
                if let Some(after) = rest.strip_prefix(placeholder) {
                    if !literal.is_empty() {
                        parts.push(Self::string_literal(&literal));
                        literal.clear();
                    }
                    parts.push(expr.to_string());
                    rest = after;
                    continue 'outer;
                }
            }
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                literal.push(c);
            }
            rest = chars.as_str();
        }

        if !literal.is_empty() {
            parts.push(Self::string_literal(&literal));
        }

        match parts.as_slice() {
            [] => "\"\"".to_string(),
            [single] if single.starts_with('"') => single.clone(),
            _ => format!("\"\" + {}", parts.join(" + ")),
        }
    }
}
