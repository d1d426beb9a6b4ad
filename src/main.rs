fn main() {
    if let Err(err) = schema_managed::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
