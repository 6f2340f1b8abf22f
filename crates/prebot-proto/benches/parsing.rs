//! Benchmarks for line parsing and reassembly.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use prebot_proto::{parse_mode_changes, ChanModes, Isupport, LineBuffer, Message};

const PING: &str = "PING :irc.example.net";

const PRIVMSG: &str = ":nick!user@host PRIVMSG #channel :Hello, world!";

const ISUPPORT: &str = ":irc.example.net 005 prebot CHANTYPES=# EXCEPTS INVEX CHANMODES=eIbq,k,flj,CFLMPQScgimnprstz CHANLIMIT=#:120 PREFIX=(ov)@+ MAXLIST=bqeI:100 MODES=4 NETWORK=Example :are supported by this server";

const NAMES: &str = ":irc.example.net 353 prebot = #rust :@alice +bob carol @+dave erin frank";

fn benchmark_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("Message Parsing");

    group.bench_function("ping", |b| {
        b.iter(|| {
            let msg: Message = black_box(PING).parse().unwrap();
            black_box(msg)
        })
    });

    group.bench_function("privmsg", |b| {
        b.iter(|| {
            let msg: Message = black_box(PRIVMSG).parse().unwrap();
            black_box(msg)
        })
    });

    group.bench_function("names_reply", |b| {
        b.iter(|| {
            let msg: Message = black_box(NAMES).parse().unwrap();
            black_box(msg)
        })
    });

    group.finish();
}

fn benchmark_isupport(c: &mut Criterion) {
    let msg = Message::parse(ISUPPORT).unwrap();

    c.bench_function("isupport_merge", |b| {
        b.iter(|| {
            let mut isupport = Isupport::default();
            isupport.merge_reply(black_box(&msg.params));
            black_box(isupport)
        })
    });

    let mut isupport = Isupport::default();
    isupport.merge_reply(&msg.params);
    let args = ["alice", "bob", "*!*@spam", "10"];

    c.bench_function("mode_decode", |b| {
        b.iter(|| {
            let prefix = isupport.prefix();
            let chanmodes = isupport.chanmodes().unwrap_or(ChanModes::DEFAULT);
            black_box(parse_mode_changes(
                black_box("+ov-b+l"),
                &args,
                &prefix,
                &chanmodes,
                true,
            ))
        })
    });

}

fn benchmark_reassembly(c: &mut Criterion) {
    let stream: String = std::iter::repeat(format!("{}\r\n", PRIVMSG)).take(64).collect();
    let mut group = c.benchmark_group("Line Reassembly");
    group.throughput(Throughput::Bytes(stream.len() as u64));

    group.bench_function("chunks_of_512", |b| {
        b.iter(|| {
            let mut buf = LineBuffer::new();
            let mut count = 0;
            for piece in stream.as_bytes().chunks(512) {
                buf.extend(piece);
                while let Ok(Some(_)) = buf.next_line() {
                    count += 1;
                }
            }
            black_box(count)
        })
    });

    group.finish();
}

criterion_group!(benches, benchmark_parsing, benchmark_isupport, benchmark_reassembly);
criterion_main!(benches);
