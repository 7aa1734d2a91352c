use criterion::Criterion;
use criterion::criterion_group;
use criterion::criterion_main;

use ks_cssd::build;
use ks_cssd::check;

pub fn cssd_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("Cssd");

    // multibranch with interior-split helices, two pseudoknots, a base triple
    let cssd = "((,<<-<___>->>,<<<___>>>,)):::<<<__[[__>>>:::]]{{:::}}~::.::~";
    let pos_var = format!("2{}3", " ".repeat(26));

    group.bench_function("Compile a pseudoknotted multibranch model.", |b| {
        b.iter(|| {
            let model = build(cssd, &pos_var).unwrap();
            assert!(check(cssd, &pos_var, &model));
        });
    });
}

criterion_group!(benches, cssd_compile);
criterion_main!(benches);
