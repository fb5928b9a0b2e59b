fn main() {
    if let Err(e) = assetkit_cli::run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
