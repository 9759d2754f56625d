fn main() {
    #[cfg(feature = "cli")]
    fiver::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("fiver: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
