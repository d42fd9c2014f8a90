fn main() {
    if let Err(err) = roilabel_lib::run() {
        eprintln!("roilabel: {err:#}");
        std::process::exit(1);
    }
}
