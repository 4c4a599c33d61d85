use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use astra::codec::ActCodec;
use astra::{
    Act, ActBase, Ask, Commit, CommitAction, CommitStatus, Constraint, ConstraintEngine,
    Conversation, Fact, Participant, SchemaRegistry, StructuralValidator,
};
use serde_json::json;

fn sample_acts() -> Vec<Act> {
    vec![
        Ask::from_base(ActBase::new("agent_1").with_confidence(0.9), "email", "What's your email?")
            .with_constraint(Constraint::required())
            .with_constraint(Constraint::email())
            .into(),
        Fact::new("customer_1", "order_42", "email", json!("jane@example.com")).into(),
        Commit::new("order_system", "order_42", CommitAction::Update)
            .with_status(CommitStatus::Success)
            .into(),
    ]
}

fn bench_structural_validation(c: &mut Criterion) {
    let validator = StructuralValidator::new();
    let acts = sample_acts();

    let mut group = c.benchmark_group("validation");
    group.throughput(Throughput::Elements(acts.len() as u64));
    group.bench_function("structural_3_acts", |b| {
        b.iter(|| {
            for act in &acts {
                validator.validate(black_box(act)).unwrap();
            }
        });
    });
    group.finish();
}

fn bench_constraint_evaluation(c: &mut Criterion) {
    let engine = ConstraintEngine::new();
    let constraints = vec![
        Constraint::required(),
        Constraint::min_length(5),
        Constraint::max_length(64),
        Constraint::pattern(r"^[a-z.]+@"),
        Constraint::email(),
        Constraint::one_of(["jane@example.com", "john@example.com"]),
    ];
    let answer = json!("jane@example.com");

    c.bench_function("constraints/evaluate_6_warm_cache", |b| {
        b.iter(|| engine.evaluate(black_box(&constraints), black_box(&answer)));
    });
}

fn bench_codec(c: &mut Criterion) {
    let codec = ActCodec::new();
    let encoded: Vec<Vec<u8>> = sample_acts()
        .iter()
        .map(|a| codec.encode(a).unwrap())
        .collect();

    let mut group = c.benchmark_group("codec");
    group.throughput(Throughput::Elements(encoded.len() as u64));
    group.bench_function("decode_3_acts", |b| {
        b.iter(|| {
            for raw in &encoded {
                black_box(codec.decode(black_box(raw)).unwrap());
            }
        });
    });
    group.finish();

    let schemas = SchemaRegistry::new();
    let values: Vec<_> = sample_acts()
        .iter()
        .map(|a| codec.encode_value(a).unwrap())
        .collect();
    c.bench_function("schema/validate_json_3_acts", |b| {
        b.iter(|| {
            for v in &values {
                schemas.validate_json(black_box(v), "act").unwrap();
            }
        });
    });
}

fn bench_append(c: &mut Criterion) {
    c.bench_function("ledger/append_100", |b| {
        b.iter(|| {
            let mut conv = Conversation::builder()
                .participant(Participant::human("customer_1"))
                .participant(Participant::ai("agent_1"))
                .build()
                .unwrap();
            for i in 0..100 {
                let ask = Ask::from_base(
                    ActBase::new("agent_1").with_id(format!("act_{i}")),
                    "email",
                    "Email?",
                );
                conv.add_act(ask.into()).unwrap();
            }
            black_box(conv.metadata().act_count)
        });
    });
}

criterion_group!(
    validation,
    bench_structural_validation,
    bench_constraint_evaluation,
    bench_codec,
    bench_append
);
criterion_main!(validation);
