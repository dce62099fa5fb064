use criterion::{black_box, criterion_group, criterion_main, Criterion};
use quote_render::{
    check_document, parse_payload, OutputEnvelope, RenderError, TemplateRenderer, TemplateSource,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "chrome_integration")]
use quote_render::{Config, PageLayout, RenderRequest, RenderService};
#[cfg(feature = "chrome_integration")]
use tokio::runtime::Runtime;

const QUOTE_TEMPLATE: &str = r#"<html><body>
<h1>{{title}}</h1>
<table>{{#each items}}<tr><td>{{name}}</td><td>{{price}}</td>{{#if (eq status "won")}}<td>won</td>{{/if}}</tr>{{/each}}</table>
</body></html>"#;

struct StaticTemplate;

impl TemplateSource for StaticTemplate {
    fn load(&self, _template_id: &str) -> Result<Option<String>, RenderError> {
        Ok(Some(QUOTE_TEMPLATE.to_string()))
    }
}

fn fake_pdf(len: usize) -> Vec<u8> {
    let mut bytes = b"%PDF-1.7\n".to_vec();
    bytes.resize(len, b'0');
    bytes
}

// Fast settings for all benchmarks
fn configure_fast_group(group: &mut criterion::BenchmarkGroup<criterion::measurement::WallTime>) {
    group.warm_up_time(Duration::from_millis(500));
    group.measurement_time(Duration::from_millis(500));
    group.sample_size(20);
}

// === UNIT BENCHMARKS ===

fn benchmark_document_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("document_check");
    configure_fast_group(&mut group);

    let valid = fake_pdf(256 * 1024);
    let html = vec![b'<'; 4096];

    group.bench_function("valid", |b| {
        b.iter(|| black_box(check_document(black_box(&valid))));
    });
    group.bench_function("bad_signature", |b| {
        b.iter(|| black_box(check_document(black_box(&html))));
    });

    group.finish();
}

fn benchmark_template_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("template_render");
    configure_fast_group(&mut group);

    let renderer = TemplateRenderer::new(Arc::new(StaticTemplate));
    let items: Vec<_> = (0..50)
        .map(|i| json!({"name": format!("Item {i}"), "price": i * 10, "status": "won"}))
        .collect();
    let data = json!({"title": "Q1", "items": items});

    group.bench_function("quote_50_rows", |b| {
        b.iter(|| black_box(renderer.render("manager_report", &data)));
    });

    group.finish();
}

fn benchmark_envelope_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("envelope");
    configure_fast_group(&mut group);

    let document = fake_pdf(512 * 1024);

    group.bench_function("success_512k", |b| {
        b.iter(|| black_box(OutputEnvelope::success(black_box(&document))));
    });

    group.finish();
}

fn benchmark_payload_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("payload");
    configure_fast_group(&mut group);

    let body = serde_json::to_vec(&json!({
        "title": "Q1",
        "items": (0..200).map(|i| json!({"name": i})).collect::<Vec<_>>(),
    }))
    .unwrap();

    group.bench_function("parse", |b| {
        b.iter(|| {
            let result = parse_payload(black_box(&body));
            let _ = black_box(result);
        });
    });

    group.finish();
}

// === INTEGRATION BENCHMARKS (Chrome required) ===

#[cfg(feature = "chrome_integration")]
fn benchmark_real_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("chrome");
    group.warm_up_time(Duration::from_secs(1));
    group.measurement_time(Duration::from_secs(5));
    group.sample_size(10);

    let rt = Runtime::new().unwrap();
    let dir = std::env::temp_dir().join("quote-render-bench");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("manager_report.hbs"), QUOTE_TEMPLATE).unwrap();

    let service = RenderService::new(Config {
        template_dir: dir,
        ..Default::default()
    });
    rt.block_on(service.warm_up());

    group.bench_function("render_quote", |b| {
        b.iter(|| {
            rt.block_on(async {
                let document = service
                    .render(RenderRequest {
                        template_id: "manager_report".to_string(),
                        data: json!({"title": "Q1"}),
                        layout: PageLayout::a4_landscape(),
                        ..Default::default()
                    })
                    .await;
                black_box(document.map(|d| d.len()).unwrap_or(0));
            })
        });
    });

    rt.block_on(service.shutdown());
    group.finish();
}

// === BENCHMARK GROUPS ===

criterion_group!(
    unit_benches,
    benchmark_document_check,
    benchmark_template_render,
    benchmark_envelope_encoding,
    benchmark_payload_parsing,
);

#[cfg(feature = "chrome_integration")]
criterion_group!(integration_benches, benchmark_real_render);

#[cfg(feature = "chrome_integration")]
criterion_main!(unit_benches, integration_benches);

#[cfg(not(feature = "chrome_integration"))]
criterion_main!(unit_benches);
