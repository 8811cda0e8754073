// Minimal smoke test: build and render hyper-images without any input files

use hyper_image::{
    frames::{group_clips, Frame, FrameName, FrameSource},
    hyper::{ClipProcessor, CompositionMode, WindowSpec},
    render::Renderer,
    video::{write_sequence, RenderedFrame},
};

/// A bright square drifting left to right over a dim background
struct DriftingSquare {
    height: usize,
    width: usize,
}

impl FrameSource for DriftingSquare {
    fn load(&self, name: &FrameName) -> hyper_image::Result<Frame> {
        let offset = name.index() as usize * 4;
        let mut frame = Frame::filled(self.height, self.width, 0.2).into_data();
        for y in 20..40 {
            for x in offset..(offset + 20).min(self.width) {
                frame[[y, x]] = 0.9;
            }
        }
        Ok(Frame::new(frame))
    }
}

/// Mean of one colour plane, to show the temporal colour bias
fn plane_mean(frame: &RenderedFrame, plane: usize) -> f32 {
    let image = frame.as_image();
    let total: u64 = image.pixels().map(|p| p[plane] as u64).sum();
    let count = (image.width() as u64 * image.height() as u64).max(1);
    total as f32 / count as f32
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Testing Hyper-Image core functionality");

    // Test 1: Grouping
    println!("\n1. Grouping frame names...");
    let names: Vec<String> = (0..8).map(|i| format!("sweep_{}.png", i)).collect();
    let clips = group_clips(&names);
    println!("   Clips: {}, frames: {}", clips.len(), clips.total_frames());
    assert_eq!(clips.len(), 1);

    let source = DriftingSquare { height: 60, width: 80 };
    let renderer = Renderer::default();

    // Test 2: Every composition mode
    for mode in CompositionMode::ALL {
        println!("\n2. Composing {} windows of width 5...", mode);
        let processor = ClipProcessor::new(WindowSpec::new(mode, 5)?);
        let output = processor.process(&clips.clips()[0], &source)?;
        println!("   Hyper-images: {} (skipped {})", output.len(), output.skipped_windows);
        assert_eq!(output.len(), 4);

        // Test 3: Rendering
        let (name, hyper) = &output.hyper_images[0];
        let rendered = renderer.render(hyper)?;
        println!("   {} -> {}x{}, mean R/G/B = {:.1}/{:.1}/{:.1}",
                 name, rendered.width(), rendered.height(),
                 plane_mean(&rendered, 0), plane_mean(&rendered, 1), plane_mean(&rendered, 2));

        let path = format!("minimal_{}.png", mode);
        match rendered.save(&path) {
            Ok(()) => println!("   Output saved to: {}", path),
            Err(e) => println!("   Could not save file: {}", e),
        }
    }

    // Test 4: Sequencing with blank frames
    println!("\n4. Sequencing frames with blank padding...");
    let frames: Vec<RenderedFrame> = (0..3).map(|_| RenderedFrame::new_filled(80, 60, [90, 90, 90])).collect();
    let mut sink: Vec<RenderedFrame> = Vec::new();
    let written = write_sequence(&mut sink, frames, (80, 60), 2, 2)?;
    println!("   Frames written: {}", written);
    assert_eq!(written, 7);

    println!("\nAll checks passed! Hyper-Image core is working.");
    Ok(())
}
