fn main() {
    if let Err(error) = call_analytics_lib::run() {
        eprintln!("call-analytics: {error:#}");
        std::process::exit(1);
    }
}
