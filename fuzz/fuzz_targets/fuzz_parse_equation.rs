#![no_main]

use libfuzzer_sys::fuzz_target;

/// Keep the harness itself bounded; equations typed into an input box are short.
const MAX_INPUT_BYTES: usize = 4_096;

fuzz_target!(|data: &[u8]| {
    let data = if data.len() > MAX_INPUT_BYTES {
        &data[..MAX_INPUT_BYTES]
    } else {
        data
    };

    // Accept arbitrary bytes as input; treat invalid UTF-8 lossy.
    let input = String::from_utf8_lossy(data);

    let Ok(tokens) = monitor_equation::parse_equation(&input) else {
        return;
    };

    // Tokenization is lossless.
    let rebuilt: String = tokens.iter().map(|t| t.content.as_str()).collect();
    assert_eq!(rebuilt, input);

    // Formatting output must itself parse, and formatting is idempotent.
    let formatted = monitor_equation::format_tokens(&tokens);
    let reparsed = monitor_equation::parse_equation(&formatted)
        .unwrap_or_else(|err| panic!("formatted {formatted:?} failed to parse: {err}"));
    assert_eq!(monitor_equation::format_tokens(&reparsed), formatted);

    // Validation never panics, whatever the known set.
    let known = monitor_equation::KnownVariables::new(
        ["A", "B", "C"],
        monitor_equation::ValidateOptions::default(),
    );
    let _ = monitor_equation::validate_tokens(&tokens, &known);
});
