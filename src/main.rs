fn main() {
    if let Err(err) = colvault::cli::run() {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}
