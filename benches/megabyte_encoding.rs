use bytes::{BufMut, Bytes, BytesMut};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use futures_core::Stream;
use futures_util::StreamExt;
use multipart_reader::MultipartReader;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::runtime::Runtime;

const TARGET: usize = 10 * 1024 * 1024;

fn criterion_benchmark(c: &mut Criterion) {
    let mut zeroes = BytesMut::with_capacity(TARGET);
    for _ in 0..(TARGET / 8) {
        zeroes.put_u64(0);
    }
    let payload = zeroes.freeze();

    let rt = Runtime::new().expect("new rt");

    let mut group = c.benchmark_group("ten megabytes");

    for chunk_size in &[512, 8 * 1024, 64 * 1024] {
        group.throughput(criterion::Throughput::Bytes(TARGET as u64));

        group.bench_with_input(
            criterion::BenchmarkId::from_parameter(chunk_size),
            chunk_size,
            |b, &size| {
                b.iter(|| {
                    let written = black_box(rt.block_on(encode_single_part(payload.clone(), size)));

                    assert!(written > TARGET as u64);
                });
            },
        );
    }
}

async fn encode_single_part(payload: Bytes, chunk_size: usize) -> u64 {
    let length = payload.len() as u64;

    let mut req = MultipartReader::new();
    req.append_form_part("file", "zeroes.bin", ChunkedStream(payload, chunk_size), Some(length))
        .unwrap();
    req.write_field("name", "value").unwrap();

    let expected = req.content_length().unwrap();

    while let Some(bytes) = req.next().await {
        black_box(bytes.unwrap());
    }

    assert_eq!(req.bytes_read(), expected);
    expected
}

struct ChunkedStream(Bytes, usize);

impl Stream for ChunkedStream {
    type Item = Result<Bytes, std::convert::Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let amt = self.1.min(self.0.len());

        if amt > 0 {
            let bytes = self.as_mut().0.split_to(amt);
            Poll::Ready(Some(Ok(bytes)))
        } else {
            Poll::Ready(None)
        }
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
