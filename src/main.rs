fn main() {
    if let Err(e) = inspection_intake_lib::run() {
        eprintln!("inspection-intake: {e}");
        std::process::exit(1);
    }
}
