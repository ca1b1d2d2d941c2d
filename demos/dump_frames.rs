//! Decodes a GIF and writes every composited screen as a PPM image.
//!
//! ```text
//! cargo run --example dump_frames -- input.gif out/
//! ```

use std::fs::{self, File};
use std::io::{prelude::*, BufWriter};
use std::path::Path;

use anyhow::{bail, Context, Result};
use log::info;

use jifplay::{decode, BlockGlyphs, Player, SeekTarget, Surface};

const MAGIC_NUMBER: &[u8] = b"P3";

fn write_ppm(path: &Path, surface: &Surface) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    writer.write_all(MAGIC_NUMBER)?;
    writer.write_all(b"\n")?;
    writer.write_all(format!("{} {} 255\n", surface.width(), surface.height()).as_bytes())?;

    if surface.width() == 0 {
        return Ok(());
    }

    for row in surface.data().chunks(surface.width() * 4) {
        let line: Vec<String> = row
            .chunks_exact(4)
            .map(|rgba| format!("{: >3} {: >3} {: >3}", rgba[0], rgba[1], rgba[2]))
            .collect();
        writer.write_all(line.join(" ").as_bytes())?;
        writer.write_all(b"\n")?;
    }

    writer.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let (Some(input), output) = (args.next(), args.next()) else {
        bail!("usage: dump_frames <input.gif> [output directory]");
    };
    let output = output.unwrap_or_else(|| ".".into());

    let bytes = fs::read(&input).with_context(|| format!("reading {}", input))?;
    let document = decode(&bytes)?;

    for anomaly in &document.anomalies {
        info!("anomaly: {}", anomaly);
    }
    for comment in &document.comments {
        info!("comment: {}", comment);
    }

    let frame_count = document.frame_count();
    info!(
        "{}x{}, {} frame(s), loop count {:?}",
        document.width(),
        document.height(),
        frame_count,
        document.loop_count
    );

    fs::create_dir_all(&output)?;

    let mut player = Player::new(Surface::new(0, 0));
    player.set_glyph_rasterizer(BlockGlyphs);
    player.load(document);

    for i in 0..frame_count {
        player.seek(SeekTarget::Index(i as i64));
        let path = Path::new(&output).join(format!("frame_{}.ppm", i));
        write_ppm(&path, player.canvas())?;
    }

    Ok(())
}
