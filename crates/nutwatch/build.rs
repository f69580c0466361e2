use std::fs;
use std::path::Path;

use clap::CommandFactory;

// The clap definitions are self-contained, so the build script compiles
// them directly to render `nutwatch.1`, `nutwatch-status.1`, and so on.
#[path = "src/cli.rs"]
mod cli;

fn main() {
    println!("cargo::rerun-if-changed=src/cli.rs");

    let Some(out_dir) = std::env::var_os("OUT_DIR") else {
        panic!("OUT_DIR is not set; build.rs must run under cargo");
    };
    let man_dir = Path::new(&out_dir).join("man");
    if let Err(e) = fs::create_dir_all(&man_dir) {
        panic!("cannot create {}: {e}", man_dir.display());
    }

    // Depth-first over visible subcommands, prefixing each page name with
    // its parent (`nutwatch-config-init`).
    let mut pending = vec![cli::Cli::command()];
    while let Some(cmd) = pending.pop() {
        let page = cmd.get_name().to_owned();
        for sub in cmd.get_subcommands().filter(|s| !s.is_hide_set()) {
            pending.push(sub.clone().name(format!("{page}-{}", sub.get_name())));
        }
        write_page(cmd, &man_dir.join(format!("{page}.1")));
    }
}

fn write_page(cmd: clap::Command, path: &Path) {
    let mut roff = Vec::new();
    if let Err(e) = clap_mangen::Man::new(cmd).render(&mut roff) {
        panic!("cannot render {}: {e}", path.display());
    }
    if let Err(e) = fs::write(path, roff) {
        panic!("cannot write {}: {e}", path.display());
    }
}
