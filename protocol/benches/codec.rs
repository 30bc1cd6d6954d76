use divan::Bencher;
use protocol::{decode, encode, Message};
use std::hint::black_box;
use std::io::Cursor;

#[global_allocator]
static ALLOC: divan::AllocProfiler = divan::AllocProfiler::system();

fn sample_message(body_len: usize) -> Message {
    Message::data(4242, vec![0x5A; body_len])
}

#[divan::bench(args = [0, 64, 256, 1024, 16384])]
fn bench_encode(bencher: Bencher, body_len: usize) {
    let msg = sample_message(body_len);
    bencher.bench(|| encode(black_box(&msg)));
}

#[divan::bench(args = [0, 64, 256, 1024, 16384])]
fn bench_decode(bencher: Bencher, body_len: usize) {
    let encoded = encode(&sample_message(body_len));
    bencher.bench(|| decode(black_box(&mut Cursor::new(encoded.as_slice()))).unwrap());
}

fn main() {
    divan::main();
}
