// dtf-walk: Walk a form template interactively.
//
// Starts a traversal session on the template and prints every instruction
// the renderer would receive. Driver actions are read from stdin, one per
// line:
//   VIEW CHOICE_INDEX      pick a choice on a rendered multiple-choice view
//   set VIEW VALUE...      type a value into a rendered field
//
// Output lines:
//   R: {instruction json}  (render / remove / complete / errored)
//   D: {decision json}     (decision for a picked choice)
//   E: message             (rejected driver action)
//
// Usage:
//   dtf-walk [-t TEMPLATE] [-r RESPONSES] [OPTIONS]
//
// Options:
//   -t, --template PATH    Template JSON (default: $DTF_TEMPLATE_PATH)
//   -r, --responses PATH   Saved response JSON used to pre-fill fields
//   --max-views N          Maximum rendered views per session
//   --no-gate-optional     Do not pause on optional, non-branching choices
//   --emit-skipped         Emit fields skipped by a branch as suppressed
//   -h, --help             Print help

use std::io::{self, BufRead, Write};

use dtf_core::RenderInstruction;
use dtf_engine::{FormSession, SessionState};

fn main() {
    dtf_cli::init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (template_path, args) = dtf_cli::parse_option(&args, "template", "-t");
    let (responses_path, args) = dtf_cli::parse_option(&args, "responses", "-r");
    let (max_views, args) = dtf_cli::parse_option(&args, "max-views", "--max-views");

    if dtf_cli::wants_help(&args) {
        println!("dtf-walk: Walk a form template interactively.");
        println!();
        println!("Usage: dtf-walk [-t TEMPLATE] [-r RESPONSES] [OPTIONS]");
        println!();
        println!("Reads driver actions from stdin (one per line):");
        println!("  VIEW CHOICE_INDEX      pick a choice");
        println!("  set VIEW VALUE...      enter a value");
        println!();
        println!("Prints:");
        println!("  R: {{instruction}}");
        println!("  D: {{decision}}");
        println!("  E: message");
        println!();
        println!("Options:");
        println!("  -t, --template PATH    Template JSON (default: $DTF_TEMPLATE_PATH)");
        println!("  -r, --responses PATH   Saved response JSON used to pre-fill fields");
        println!("  --max-views N          Maximum rendered views per session");
        println!("  --no-gate-optional     Do not pause on optional, non-branching choices");
        println!("  --emit-skipped         Emit fields skipped by a branch as suppressed");
        println!("  -h, --help             Print this help");
        return;
    }

    let no_gate = args.iter().any(|a| a == "--no-gate-optional");
    let emit_skipped = args.iter().any(|a| a == "--emit-skipped");

    let template = dtf_cli::load_template(template_path.as_deref())
        .unwrap_or_else(|e| dtf_cli::fatal(e));
    let mut session = FormSession::new(template);
    if let Some(path) = responses_path.as_deref() {
        let response = dtf_cli::load_response(path).unwrap_or_else(|e| dtf_cli::fatal(e));
        session = session.with_response(&response);
    }
    if no_gate {
        session.set_gate_optional_choices(false);
    }
    if emit_skipped {
        session.set_emit_skipped_fields(true);
    }
    if let Some(n) = max_views {
        let n = n
            .parse::<usize>()
            .unwrap_or_else(|_| dtf_cli::fatal(format!("invalid --max-views value: {n}")));
        session.set_max_rendered_views(n);
    }

    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());

    let instructions = session.start().unwrap_or_else(|e| dtf_cli::fatal(e));
    print_instructions(&mut out, &instructions);
    let _ = out.flush();

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("error reading stdin: {e}");
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            ["set", view, value @ ..] => match view.parse() {
                Ok(view_id) => {
                    if let Err(e) = session.set_value(view_id, value.join(" ")) {
                        let _ = writeln!(out, "E: {e}");
                    }
                }
                Err(_) => {
                    let _ = writeln!(out, "E: invalid view id: {view}");
                }
            },
            [view, index] => match (view.parse(), index.parse()) {
                (Ok(view_id), Ok(choice_index)) => {
                    pick(&mut session, &mut out, view_id, choice_index);
                }
                _ => {
                    let _ = writeln!(out, "E: expected VIEW CHOICE_INDEX, got: {line}");
                }
            },
            _ => {
                let _ = writeln!(out, "E: unrecognized action: {line}");
            }
        }
        let _ = out.flush();

        if matches!(session.state(), SessionState::Errored(_)) {
            break;
        }
    }
    session.close();
}

fn pick(session: &mut FormSession, out: &mut impl Write, view_id: u32, choice_index: usize) {
    let Some(choice) = dtf_cli::choice_for_view(session, view_id, choice_index) else {
        let _ = writeln!(out, "E: no rendered view {view_id}");
        return;
    };
    match session.choose(&choice) {
        Ok(decision) => {
            match serde_json::to_string(&decision) {
                Ok(json) => {
                    let _ = writeln!(out, "D: {json}");
                }
                Err(e) => {
                    let _ = writeln!(out, "E: {e}");
                }
            }
            let instructions = session.pump();
            print_instructions(out, &instructions);
        }
        Err(e) => {
            let _ = writeln!(out, "E: {e}");
            if e.is_session_fatal() {
                print_instructions(
                    out,
                    &[RenderInstruction::Errored {
                        message: e.to_string(),
                    }],
                );
            }
        }
    }
}

fn print_instructions(out: &mut impl Write, instructions: &[RenderInstruction]) {
    for instruction in instructions {
        match serde_json::to_string(instruction) {
            Ok(json) => {
                let _ = writeln!(out, "R: {json}");
            }
            Err(e) => {
                let _ = writeln!(out, "E: {e}");
            }
        }
    }
}
