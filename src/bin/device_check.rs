use handi::config::HandiConfig;
use handi::midi;
use handi::video::{self, CameraSource};

fn main() {
    tracing_subscriber::fmt::init();
    let config = match HandiConfig::load_or_default(None) {
        Ok(config) => config,
        Err(e) => {
            println!("✗ Failed to load configuration: {}", e);
            HandiConfig::default()
        }
    };

    println!("Checking devices...\n");

    match video::list_cameras() {
        Ok(cameras) => {
            println!("Found {} camera(s):", cameras.len());
            for (i, name) in cameras.iter().enumerate() {
                println!("  [{}] {}", i, name);
            }
        }
        Err(e) => println!("✗ Failed to query cameras: {}", e),
    }

    match CameraSource::open(config.camera_index, config.frame_height) {
        Ok(mut camera) => {
            println!("✓ Camera {} opened", config.camera_index);
            match camera.read_frame() {
                Ok(frame) => println!("✓ Frame captured ({}x{})", frame.width(), frame.height()),
                Err(e) => println!("✗ Failed to capture frame: {}", e),
            }
        }
        Err(e) => {
            println!("✗ {}", e);
            println!("\nPossible causes:");
            println!("1. Camera is being used by another app");
            println!("2. Camera permissions not granted");
            println!("3. No camera connected");
        }
    }

    println!();
    match midi::list_ports() {
        Ok(ports) if ports.is_empty() => println!("✗ No MIDI outputs found"),
        Ok(ports) => {
            println!("✓ {} MIDI output(s):", ports.len());
            for (i, name) in ports.iter().enumerate() {
                println!("  [{}] {}", i, name);
            }
        }
        Err(e) => println!("✗ Failed to query MIDI outputs: {}", e),
    }
}
