use std::hint::black_box;
use std::time::Instant;

use oceanview_common::Extent2d;
use oceanview_gpu::{
    AttachmentPoint, GpuContext, HeadlessBackend, RenderTarget, TextureDescriptor, TextureFormat,
    TextureStore,
};
use oceanview_render::{GpuMesh, Mesh};

fn bench_grid(size: u32, resolution: u32, iterations: usize) {
    let Ok(mesh) = Mesh::grid(size, resolution) else {
        println!("  grid {size}x{resolution}: too large");
        return;
    };
    let start = Instant::now();
    for _ in 0..iterations {
        black_box(Mesh::grid(black_box(size), black_box(resolution)));
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    let stats = mesh.stats();
    println!(
        "  grid {size}x{resolution} ({} verts, {} indices, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}",
        stats.vertex_count, stats.index_count
    );
}

fn bench_upload(size: u32, resolution: u32, iterations: usize) {
    let ctx = GpuContext::new(HeadlessBackend::new());
    let Ok(mesh) = Mesh::grid(size, resolution) else {
        println!("  headless upload {size}x{resolution}: too large");
        return;
    };
    let start = Instant::now();
    for _ in 0..iterations {
        let gpu = GpuMesh::upload(&ctx, black_box(&mesh));
        let _ = black_box(gpu);
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "  headless upload {size}x{resolution} ({iterations} iters): {per_iter:?}/iter, total {elapsed:?}"
    );
}

fn bench_resize_cascade(iterations: usize) {
    let ctx = GpuContext::new(HeadlessBackend::new());
    let mut store = TextureStore::new();
    let Some(extent) = Extent2d::new(640, 480) else {
        return;
    };
    let (Ok(color), Ok(depth), Ok(mut target)) = (
        store.create(&ctx, TextureDescriptor::empty("color", extent, TextureFormat::Rgba8)),
        store.create(&ctx, TextureDescriptor::empty("depth", extent, TextureFormat::Depth24)),
        RenderTarget::new(&ctx),
    ) else {
        println!("  resize cascade: setup failed");
        return;
    };
    let _ = target.attach(AttachmentPoint::Color(0), color, &store);
    let _ = target.attach(AttachmentPoint::Depth, depth, &store);

    let start = Instant::now();
    for i in 0..iterations {
        let w = 640 + (i % 64) as i32;
        let _ = black_box(target.resize(black_box(w), 480, &mut store));
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!("  resize cascade ({iterations} iters): {per_iter:?}/iter, total {elapsed:?}");
}

fn main() {
    println!("=== Mesh Benchmarks ===\n");

    println!("Grid generation:");
    bench_grid(20, 4, 1000);
    bench_grid(64, 4, 100);
    bench_grid(128, 8, 10);

    println!("\nHeadless upload:");
    bench_upload(20, 4, 1000);
    bench_upload(128, 8, 10);

    println!("\nRender target resize:");
    bench_resize_cascade(10000);

    println!("\n=== Done ===");
}
