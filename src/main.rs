use std::process::exit;
use std::sync::Arc;

use hyperbola::nnue::Network;
use hyperbola::uci;

/// Weight asset resolution: CLI argument, then environment variable,
/// then a file next to the working directory.
fn weights_path() -> String {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var("HYPERBOLA_NNUE").ok())
        .unwrap_or_else(|| "hyperbola.nnue".to_string())
}

fn main() {
    let path = weights_path();
    match Network::load(&path) {
        Ok(net) => uci::run(Arc::new(net)),
        Err(err) => {
            eprintln!("fatal: cannot load NNUE weights from '{path}': {err}");
            exit(1);
        }
    }
}
