#![no_main]
use libfuzzer_sys::fuzz_target;

const SUBCOMMANDS: [&str; 3] = ["sessions", "get", "decode"];

fuzz_target!(|data: &[u8]| {
    let Some((&selector, rest)) = data.split_first() else {
        return;
    };
    let text = String::from_utf8_lossy(rest);
    let args: Vec<String> = std::iter::once(SUBCOMMANDS[selector as usize % 3].to_string())
        .chain(text.split_whitespace().take(24).map(str::to_string))
        .collect();
    javaser::cli::fuzz_try_parse_args(&args);
});
