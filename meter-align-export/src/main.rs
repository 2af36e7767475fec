fn main() {
    if let Err(err) = meter_align::app::run() {
        eprintln!("meter comparison export failed: {err}");
        std::process::exit(1);
    }
}
