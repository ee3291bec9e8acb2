// tests/tagging.rs

use std::error::Error;

use proptest::prelude::*;
use tokio::io::AsyncWriteExt;

use fanrun::dispatch::{OutputSink, tag_lines};
use fanrun_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn concurrent_taggers_interleave_only_at_line_boundaries() -> TestResult {
    init_tracing();
    let (sink, mut rx) = OutputSink::capture();

    // Small duplex buffers force the taggers to see lines in several
    // partial reads.
    let (mut wa, ra) = tokio::io::duplex(16);
    let (mut wb, rb) = tokio::io::duplex(16);

    let ta = {
        let sink = sink.clone();
        tokio::spawn(async move { tag_lines(ra, "/a", &sink).await })
    };
    let tb = {
        let sink = sink.clone();
        tokio::spawn(async move { tag_lines(rb, "/b", &sink).await })
    };

    for i in 0..20 {
        // Write half a line to each target, yield, then finish both lines,
        // so the taggers run with torn input.
        wa.write_all(b"aaa").await?;
        wb.write_all(b"bbb").await?;
        tokio::task::yield_now().await;
        wa.write_all(format!("aaa{i}\n").as_bytes()).await?;
        wb.write_all(format!("bbb{i}\n").as_bytes()).await?;
    }
    drop(wa);
    drop(wb);

    with_timeout(ta).await??;
    with_timeout(tb).await??;
    drop(sink);

    let mut lines = Vec::new();
    while let Some(line) = rx.recv().await {
        lines.push(line);
    }

    assert_eq!(lines.len(), 40);
    let mut next_a = 0;
    let mut next_b = 0;
    for line in &lines {
        if let Some(rest) = line.strip_prefix("/a ") {
            assert_eq!(rest, format!("aaaaaa{next_a}"));
            next_a += 1;
        } else if let Some(rest) = line.strip_prefix("/b ") {
            assert_eq!(rest, format!("bbbbbb{next_b}"));
            next_b += 1;
        } else {
            panic!("line from nowhere: {line:?}");
        }
    }
    assert_eq!((next_a, next_b), (20, 20));
    Ok(())
}

#[tokio::test]
async fn a_fragment_without_terminator_is_not_lost() -> TestResult {
    init_tracing();
    let (sink, mut rx) = OutputSink::capture();

    tag_lines(&b"complete\nun-terminated"[..], "/t", &sink).await?;
    drop(sink);

    let mut lines = Vec::new();
    while let Some(line) = rx.recv().await {
        lines.push(line);
    }
    assert_eq!(lines, ["/t complete", "/t un-terminated"]);
    Ok(())
}

proptest! {
    // Tagging then stripping the label must reproduce the input's lines,
    // modulo the trailing newline, for arbitrary byte content: a line that
    // is not valid UTF-8 decodes lossily but is never dropped.
    #[test]
    fn tagged_output_round_trips_to_the_input_lines(
        lines in proptest::collection::vec(
            proptest::collection::vec(
                any::<u8>().prop_filter("not a line terminator", |b| *b != b'\n' && *b != b'\r'),
                0..40,
            ),
            0..20,
        ),
        trailing_newline in any::<bool>(),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let mut input = lines.join(&b'\n');
            if trailing_newline && !input.is_empty() {
                input.push(b'\n');
            }

            let (sink, mut rx) = OutputSink::capture();
            tag_lines(&input[..], "/prop", &sink).await.unwrap();
            drop(sink);

            let mut tagged = Vec::new();
            while let Some(line) = rx.recv().await {
                tagged.push(line);
            }

            let stripped: Vec<&str> = tagged
                .iter()
                .map(|l| l.strip_prefix("/prop ").expect("missing label"))
                .collect();

            let mut expected: Vec<String> = input
                .split(|b| *b == b'\n')
                .map(|l| String::from_utf8_lossy(l).into_owned())
                .collect();
            if expected.last().map(String::as_str) == Some("") {
                expected.pop();
            }
            assert_eq!(stripped, expected);
        });
    }
}
