fn main() {
    if let Err(err) = intervals_lib::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
