fn main() {
    if let Err(err) = graph_scene::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
