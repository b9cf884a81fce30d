use divan::AllocProfiler;
use divan::{Bencher, black_box};
use treeconvert::{Format, FormatRegistry, ParseOptions, RenderOptions};

#[global_allocator]
static ALLOC: AllocProfiler = AllocProfiler::system();

fn main() {
    divan::main();
}

const CONLLU: &str = "# sent_id = bench.1
1\tThe\tthe\tDET\tDT\t_\t2\tdet\t_\t_
2\tcats\tcat\tNOUN\tNNS\t_\t6\tnsubj\t_\t_
3\tand\tand\tCCONJ\tCC\t_\t4\tcc\t_\t_
4\tdogs\tdog\tNOUN\tNNS\t_\t2\tconj\t_\t_
5\tquickly\tquickly\tADV\tRB\t_\t6\tadvmod\t_\t_
6\tslept\tsleep\tVERB\tVBD\t_\t0\troot\t_\t_
7\t.\t.\tPUNCT\t.\t_\t6\tpunct\t_\t_";

const AMR: &str = "# ::id bench.2
# ::tok the boy wants to go home
(w / want-01~e.2
    :ARG0 (b / boy~e.1)
    :ARG1 (g / go-02~e.4
        :ARG0 b
        :ARG4 (h / home~e.5)))";

fn lines(text: &str) -> Vec<&str> {
    text.lines().collect()
}

#[divan::bench]
fn conllu_round_trip(bencher: Bencher) {
    let registry = FormatRegistry::new();
    let input = lines(CONLLU);
    let parse = ParseOptions::default();
    let render = RenderOptions::default();
    bencher.bench_local(|| {
        let graph = registry
            .parse_one(Format::Conllu, black_box(&input), "bench", &parse)
            .unwrap();
        black_box(registry.render(Format::Conllu, &graph, &render).unwrap());
    });
}

#[divan::bench]
fn conllu_to_export(bencher: Bencher) {
    let registry = FormatRegistry::new();
    let input = lines(CONLLU);
    let parse = ParseOptions::default();
    let render = RenderOptions::default();
    bencher.bench_local(|| {
        let graph = registry
            .parse_one(Format::Conllu, black_box(&input), "bench", &parse)
            .unwrap();
        black_box(registry.render(Format::Export, &graph, &render).unwrap());
    });
}

#[divan::bench]
fn amr_round_trip(bencher: Bencher) {
    let registry = FormatRegistry::new();
    let input = lines(AMR);
    let parse = ParseOptions::default();
    let render = RenderOptions::default().with_use_original(false);
    bencher.bench_local(|| {
        let graph = registry
            .parse_one(Format::Amr, black_box(&input), "bench", &parse)
            .unwrap();
        black_box(registry.render(Format::Amr, &graph, &render).unwrap());
    });
}
