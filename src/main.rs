fn main() {
    #[cfg(feature = "cli")]
    javaser::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("javaser: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
