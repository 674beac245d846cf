//! Benchmarks for the hot text-transform paths: playlist rewriting and
//! subtitle normalization. Both run on every playlist/subtitle request.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use url::Url;
use vidproxy::hls::rewrite::{RewriteContext, rewrite_playlist};
use vidproxy::subtitle;

fn media_playlist(segments: usize) -> String {
    let mut out = String::from("#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:6\n");
    for i in 0..segments {
        out.push_str("#EXTINF:6.000,\n");
        out.push_str(&format!("segment_{i:05}.ts\n"));
    }
    out.push_str("#EXT-X-ENDLIST\n");
    out
}

fn srt_document(cues: usize) -> String {
    let mut out = String::new();
    for i in 0..cues {
        let start = i * 3;
        out.push_str(&format!(
            "{}\n00:{:02}:{:02},000 --> 00:{:02}:{:02},500\nCue number {i}\n\n",
            i + 1,
            start / 60,
            start % 60,
            (start + 2) / 60,
            (start + 2) % 60,
        ));
    }
    out
}

fn bench_rewrite(c: &mut Criterion) {
    let base = Url::parse("https://cdn.example.com/vod/title/index.m3u8").unwrap();
    let ctx = RewriteContext {
        proxy_origin: "https://proxy.example".to_string(),
        referer: Some("https://site.example/watch".to_string()),
        subtitle_url: None,
    };

    let mut group = c.benchmark_group("rewrite_playlist");
    for segments in [50usize, 500, 5000] {
        let playlist = media_playlist(segments);
        group.bench_function(format!("{segments}_segments"), |b| {
            b.iter(|| rewrite_playlist(black_box(&playlist), &base, &ctx));
        });
    }
    group.finish();
}

fn bench_subtitles(c: &mut Criterion) {
    let mut group = c.benchmark_group("subtitle_normalize");
    for cues in [100usize, 1000] {
        let srt = srt_document(cues);
        group.bench_function(format!("srt_{cues}_cues"), |b| {
            b.iter(|| subtitle::normalize(black_box(srt.as_bytes()), true));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_rewrite, bench_subtitles);
criterion_main!(benches);
