use serde_json::Value;

use canvasflow_core::types::value_to_text;

const PLACEHOLDER: &str = "$input";

/// Replace `$inputN` (1-based) and bare `$input` (the first input) with the
/// text of the corresponding input.
///
/// Digits are read greedily, so `$input12` refers to the twelfth input and
/// never to the first input followed by `2`. Placeholders with no matching
/// input are left untouched.
pub fn substitute_inputs(template: &str, inputs: &[Value]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find(PLACEHOLDER) {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + PLACEHOLDER.len()..];
        let digits = after.bytes().take_while(u8::is_ascii_digit).count();

        let index = if digits == 0 {
            Some(0)
        } else {
            after[..digits]
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
        };

        match index.and_then(|i| inputs.get(i)) {
            Some(value) => out.push_str(&value_to_text(value)),
            None => out.push_str(&rest[pos..pos + PLACEHOLDER.len() + digits]),
        }
        rest = &after[digits..];
    }

    out.push_str(rest);
    out
}

/// True if `template` references any input.
pub fn has_placeholders(template: &str) -> bool {
    template.contains(PLACEHOLDER)
}
