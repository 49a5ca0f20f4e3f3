// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Scanward - Performance Benchmarks
//! © 2026 Bountyy Oy
//!
//! Hot paths of a crawl: URL normalization, link extraction and fingerprinting

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::collections::HashMap;
use std::time::Duration;

use scanward::analysis::TechnologyFingerprinter;
use scanward::crawler::{crawl_progress, extract_links};
use scanward::url_normalizer;

fn sample_urls() -> Vec<String> {
    vec![
        "https://EXAMPLE.com:443/shop/?utm_source=news&b=2&a=1#reviews".to_string(),
        "http://example.com:80/index.html".to_string(),
        "https://example.com/api/v1/products/search?q=test&category=electronics&sort=price".to_string(),
        "https://example.com/static/app.js?v=12".to_string(),
        "https://example.com/docs/".to_string(),
        "https://example.com/login?redirect=/dashboard&gclid=abc123".to_string(),
    ]
}

fn benchmark_normalize(c: &mut Criterion) {
    let urls = sample_urls();

    c.bench_function("url_normalize", |b| {
        b.iter(|| {
            for url in &urls {
                black_box(url_normalizer::normalize(black_box(url)));
            }
        })
    });
}

fn benchmark_dedupe(c: &mut Criterion) {
    let mut group = c.benchmark_group("url_dedupe");

    for size in [10usize, 100, 1000] {
        let urls: Vec<String> = (0..size)
            .map(|i| format!("https://example.com/page/{}?utm_medium=x&id={}", i % (size / 2).max(1), i % 7))
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(size), &urls, |b, urls| {
            b.iter(|| black_box(url_normalizer::dedupe(urls.iter())))
        });
    }

    group.finish();
}

fn benchmark_link_extraction(c: &mut Criterion) {
    let links: String = (0..200)
        .map(|i| match i % 4 {
            0 => format!(r#"<a href="/products/{}">Product</a>"#, i),
            1 => format!(r#"<a href="https://cdn.other.net/{}.png">img</a>"#, i),
            2 => format!(r#"<link rel="stylesheet" href="/css/{}.css">"#, i),
            _ => format!(r#"<form action="/search?page={}"></form>"#, i),
        })
        .collect();
    let html = format!("<!DOCTYPE html><html><head></head><body>{}</body></html>", links);

    c.bench_function("extract_links_200", |b| {
        b.iter(|| black_box(extract_links(black_box(&html), "https://example.com/", "https://example.com/")))
    });
}

fn benchmark_fingerprint(c: &mut Criterion) {
    let fingerprinter = TechnologyFingerprinter::new();

    let mut headers = HashMap::new();
    headers.insert("server".to_string(), "nginx/1.18.0".to_string());
    headers.insert("x-powered-by".to_string(), "PHP/7.4.3".to_string());
    headers.insert("strict-transport-security".to_string(), "max-age=31536000".to_string());
    headers.insert("x-frame-options".to_string(), "DENY".to_string());

    let html = r#"<!DOCTYPE html><html><head>
        <meta name="generator" content="WordPress 6.4.2">
        <link rel="stylesheet" href="/wp-content/themes/site/style.css">
        <script src="https://code.jquery.com/jquery-3.7.1.min.js"></script>
        </head><body><div id="root"></div></body></html>"#;

    c.bench_function("fingerprint_page", |b| {
        b.iter(|| black_box(fingerprinter.analyze(black_box(&headers), black_box(html))))
    });
}

fn benchmark_progress(c: &mut Criterion) {
    c.bench_function("crawl_progress", |b| {
        b.iter(|| {
            for visited in 0..100usize {
                black_box(crawl_progress(visited, 100 - visited, 4, 100));
            }
        })
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default().measurement_time(Duration::from_secs(5));
    targets =
        benchmark_normalize,
        benchmark_dedupe,
        benchmark_link_extraction,
        benchmark_fingerprint,
        benchmark_progress
);

criterion_main!(benches);
