use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use procsnap::system::collector::{Collector, CollectorSettings};
use procsnap::system::fs::MockFs;
use procsnap::system::helper::{CapacityProbe, DiskUsage, ProbeError};
use procsnap::system::process::read_process;
use procsnap::system::resources::classify;
use std::hint::black_box;
use std::path::Path;
use std::sync::Arc;

struct FixedProbe;

impl CapacityProbe for FixedProbe {
    fn probe(&self, _mount_point: &str) -> Result<DiskUsage, ProbeError> {
        Ok(DiskUsage {
            total_bytes: 100 << 30,
            used_bytes: 40 << 30,
            free_bytes: 60 << 30,
            percent_used: 40.0,
        })
    }
}

fn make_fs(n: u32) -> MockFs {
    let mut fs = MockFs::new();
    fs.add_file("/proc/stat", "cpu  74608 2520 24433 1117073 6176 4054 0 0 0 0\n");
    fs.add_file(
        "/proc/meminfo",
        "MemTotal: 16318504 kB\nMemFree: 8123456 kB\nBuffers: 234567 kB\nCached: 3456789 kB\nSwapTotal: 2097148 kB\nSwapFree: 2000000 kB\n",
    );
    fs.add_file("/proc/mounts", "/dev/nvme0n1p2 / ext4 rw 0 0\n/dev/nvme0n1p1 /boot/efi vfat rw 0 0\n");
    fs.add_file("/etc/passwd", "root:x:0:0::/root:/bin/sh\nu1:x:1000:1000::/home/u1:/bin/sh\n");
    for i in 0..n {
        let pid = i + 1;
        let status = format!(
            "Name:\tproc_{i}\nState:\tS (sleeping)\nPPid:\t{}\nUid:\t{uid}\t{uid}\t{uid}\t{uid}\nThreads:\t{}\nVmRSS:\t{} kB\n",
            pid / 2,
            i % 8 + 1,
            (n - i) * 64,
            uid = if i % 2 == 0 { 0 } else { 1000 },
        );
        let stat = format!("{pid} (proc_{i}) S {} 1 1 0 -1 0 0 0 0 0 {} {} 0 0 20 0 1 0", pid / 2, i * 3, i);
        let cmdline = format!("/usr/bin/proc_{i}\0--work\0");
        fs.add_process(Path::new("/proc"), pid, &status, &stat, cmdline.as_bytes());
    }
    fs
}

fn bench_refresh(c: &mut Criterion) {
    let mut group = c.benchmark_group("refresh");
    for n in [500, 1000, 2000] {
        let collector = Collector::new(
            Arc::new(make_fs(n)),
            Arc::new(FixedProbe),
            CollectorSettings::default(),
        );
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| black_box(collector.refresh()))
        });
    }
    group.finish();
}

fn bench_read_process(c: &mut Criterion) {
    let fs = make_fs(1);
    c.bench_function("read_process", |b| {
        b.iter(|| black_box(read_process(&fs, Path::new("/proc"), black_box(1))))
    });
}

fn bench_classify(c: &mut Criterion) {
    let targets = ["socket:[12345]", "pipe:[678]", "anon_inode:[eventfd]", "/var/log/syslog", "/gone (deleted)"];
    c.bench_function("classify_descriptor_targets", |b| {
        b.iter(|| {
            for target in targets {
                black_box(classify(black_box(target), |p| p.starts_with("/var")));
            }
        })
    });
}

criterion_group!(benches, bench_refresh, bench_read_process, bench_classify);
criterion_main!(benches);
