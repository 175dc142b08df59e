use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use cobol_cfg::node::{SymbolRef, Verb};
use cobol_cfg::tree::{DivisionDef, ParagraphDef, ProgramDef, ProgramKind, SourceTree, Stmt, StmtNode, WhenDef};
use cobol_cfg::{drive, to_dot, CfgBuilder, CfgConfig};

fn verb(verb: Verb) -> StmtNode {
    Stmt::Statement { verb, conditions: Vec::new() }.into()
}

/// `paragraphs` paragraphs; each performs the next one, branches on a
/// condition and jumps back to the first paragraph every tenth time
fn synthetic(paragraphs: usize) -> SourceTree {
    let mut defs = Vec::with_capacity(paragraphs);
    for i in 0..paragraphs {
        let mut sentence = vec![
            verb(Verb::Move),
            Stmt::If {
                then: vec![verb(Verb::Add)],
                otherwise: Some(vec![verb(Verb::Subtract)]),
            }
            .into(),
            Stmt::Evaluate {
                whens: vec![
                    WhenDef { conditions: vec!["1".into()], body: vec![verb(Verb::Display)] },
                    WhenDef { conditions: vec!["2".into()], body: vec![verb(Verb::Compute)] },
                ],
                other: Some(vec![verb(Verb::Continue)]),
            }
            .into(),
        ];
        if i + 1 < paragraphs {
            sentence.push(
                Stmt::Perform {
                    procedure: SymbolRef::new(format!("P{}", i + 1)),
                    through: None,
                }
                .into(),
            );
        }
        if i % 10 == 9 {
            sentence.push(
                Stmt::GoTo {
                    targets: vec![SymbolRef::new("P0"), SymbolRef::new(format!("P{}", i))],
                    depending: true,
                }
                .into(),
            );
        }
        defs.push(ParagraphDef {
            name: format!("P{}", i),
            span: Default::default(),
            sentences: vec![sentence, vec![verb(Verb::Write)]],
        });
    }
    SourceTree {
        programs: vec![ProgramDef {
            name: "BENCH".into(),
            kind: ProgramKind::Program,
            procedure_division: Some(DivisionDef {
                sentences: vec![vec![Stmt::StopRun.into()]],
                paragraphs: defs,
                ..Default::default()
            }),
            nested: Vec::new(),
        }],
    }
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");

    for size in [10usize, 100, 500] {
        let tree = synthetic(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("normal", size), &tree, |b, tree| {
            b.iter(|| {
                let mut builder = CfgBuilder::new(CfgConfig::default());
                drive(black_box(tree), &mut builder);
                builder.finish()
            });
        });
    }

    // grafting copies every nested group, so keep chains short
    let tree = synthetic(12);
    group.bench_function("extended_12", |b| {
        b.iter(|| {
            let mut builder = CfgBuilder::new(CfgConfig::extended());
            drive(black_box(&tree), &mut builder);
            builder.finish()
        });
    });

    group.finish();
}

fn bench_dot(c: &mut Criterion) {
    let mut builder = CfgBuilder::new(CfgConfig::default());
    drive(&synthetic(100), &mut builder);
    let programs = builder.finish();

    c.bench_function("dot_100", |b| {
        b.iter(|| to_dot(black_box(&programs[0].graph)));
    });
}

criterion_group!(benches, bench_build, bench_dot);
criterion_main!(benches);
