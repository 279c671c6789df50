// Criterion benchmarks for dtf-engine.
//
// Templates are generated in memory, so no fixture files are needed.
//
// Run:
//   cargo bench -p dtf-engine

use criterion::{Criterion, criterion_group, criterion_main};

use dtf_core::{Choice, FieldDefinition, FieldKind, FormChoice, FormTemplate, ViewId};
use dtf_engine::{DraftTracker, FormSession, SessionState};

// ---------------------------------------------------------------------------
// Template generators
// ---------------------------------------------------------------------------

/// `n` plain text fields.
fn linear_template(n: u32) -> FormTemplate {
    let fields = (1..=n)
        .map(|seq| FieldDefinition::new(seq, seq, FieldKind::Text))
        .collect();
    FormTemplate::new(1, "Linear", fields)
}

/// Loop of `count` passes whose body ends in a choice.
///
/// 1 LoopStart, 2 Text, 3 Numeric, 4 Choice(Next | Stop -> 6), 5 LoopEnd,
/// 6 Text
fn looping_template(count: i32) -> FormTemplate {
    FormTemplate::new(
        2,
        "Loop",
        vec![
            FieldDefinition::loop_start(1, 1, count, None),
            FieldDefinition::new(2, 2, FieldKind::Text),
            FieldDefinition::new(3, 3, FieldKind::Numeric),
            FieldDefinition::multiple_choice(
                4,
                4,
                vec![Choice::new("Next"), Choice::branching("Stop", 6)],
            ),
            FieldDefinition::new(5, 5, FieldKind::LoopEnd),
            FieldDefinition::new(6, 6, FieldKind::Text),
        ],
    )
}

/// Outer loop of `outer` passes around an inner loop of `inner` passes.
fn nested_template(outer: i32, inner: i32) -> FormTemplate {
    FormTemplate::new(
        3,
        "Nested",
        vec![
            FieldDefinition::loop_start(1, 1, outer, None),
            FieldDefinition::new(2, 2, FieldKind::Display),
            FieldDefinition::loop_start(3, 3, inner, None),
            FieldDefinition::new(4, 4, FieldKind::Barcode),
            FieldDefinition::new(5, 5, FieldKind::LoopEnd),
            FieldDefinition::new(6, 6, FieldKind::LoopEnd),
            FieldDefinition::new(7, 7, FieldKind::Text),
        ],
    )
}

fn awaiting_view(session: &FormSession) -> Option<ViewId> {
    match session.state() {
        SessionState::AwaitingResponse { view_id, .. } => Some(*view_id),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Render a 500-field form with no branching.
fn bench_linear(c: &mut Criterion) {
    let template = linear_template(500);
    c.bench_function("linear_500_fields", |b| {
        b.iter(|| {
            let mut session = FormSession::new(template.clone());
            std::hint::black_box(session.start().ok());
        });
    });
}

/// Answer "Next" on every pass of a 100-pass loop.
fn bench_answered_loop(c: &mut Criterion) {
    let template = looping_template(100);
    c.bench_function("loop_100_answered_passes", |b| {
        b.iter(|| {
            let mut session = FormSession::new(template.clone());
            let _ = session.start();
            while let Some(view_id) = awaiting_view(&session) {
                let out = session.answer(&FormChoice::new(4, 0, None, view_id));
                std::hint::black_box(out.ok());
            }
        });
    });
}

/// Walk a 20 x 20 nested loop without driver input.
fn bench_nested(c: &mut Criterion) {
    let template = nested_template(20, 20);
    c.bench_function("nested_20x20", |b| {
        b.iter(|| {
            let mut session = FormSession::new(template.clone());
            std::hint::black_box(session.start().ok());
        });
    });
}

/// Compare a 500-field snapshot against its saved copy.
fn bench_draft_diff(c: &mut Criterion) {
    let mut session = FormSession::new(linear_template(500));
    let _ = session.start();
    let tracker = DraftTracker::with_baseline(session.draft_snapshot(["dispatch"]));
    let current = session.draft_snapshot(["dispatch"]);
    c.bench_function("draft_diff_500_fields", |b| {
        b.iter(|| std::hint::black_box(tracker.has_something_to_draft(&current, true)));
    });
}

criterion_group!(
    benches,
    bench_linear,
    bench_answered_loop,
    bench_nested,
    bench_draft_diff
);
criterion_main!(benches);
