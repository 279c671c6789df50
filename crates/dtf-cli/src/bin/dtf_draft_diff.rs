// dtf-draft-diff: Decide whether a form has unsaved changes.
//
// Compares the current field snapshot against the last saved one and prints
// one line:
//   DRAFT     (something changed since the last save)
//   CLEAN     (nothing to save)
//
// Snapshot files hold {"fields": [...], "recipients": [...]}.
//
// Usage:
//   dtf-draft-diff [OPTIONS] CURRENT [SAVED]
//
// Options:
//   --recipients    Also compare selected recipients
//   -h, --help      Print help

fn main() {
    dtf_cli::init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();

    if dtf_cli::wants_help(&args) {
        println!("dtf-draft-diff: Decide whether a form has unsaved changes.");
        println!();
        println!("Usage: dtf-draft-diff [OPTIONS] CURRENT [SAVED]");
        println!();
        println!("Prints DRAFT when CURRENT differs from SAVED, CLEAN otherwise.");
        println!("Without a readable SAVED there is always something to draft.");
        println!();
        println!("Options:");
        println!("  --recipients    Also compare selected recipients");
        println!("  -h, --help      Print this help");
        return;
    }

    let check_recipients = args.iter().any(|a| a == "--recipients");
    let paths: Vec<&String> = args.iter().filter(|a| !a.starts_with('-')).collect();

    let (current, saved) = match paths.as_slice() {
        [current] => (current.as_str(), None),
        [current, saved] => (current.as_str(), Some(saved.as_str())),
        _ => dtf_cli::fatal("expected CURRENT [SAVED] snapshot paths (see --help)"),
    };

    let current = dtf_cli::load_snapshot(current).unwrap_or_else(|e| dtf_cli::fatal(e));
    let tracker = dtf_cli::saved_tracker(saved);

    if tracker.has_something_to_draft(&current, check_recipients) {
        println!("DRAFT");
    } else {
        println!("CLEAN");
    }
}
