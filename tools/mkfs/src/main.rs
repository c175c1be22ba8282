//! Packs a directory of flat program binaries into the ext2 image the
//! kernel embeds as its boot filesystem.

use ext2_image::ImageBuilder;
use std::{env, fs, io, process};

fn main() -> io::Result<()> {
    let mut args = env::args().skip(1);
    let (Some(dir), Some(out)) = (args.next(), args.next()) else {
        eprintln!("usage: mkfs <input-dir> <output-image>");
        process::exit(2);
    };

    let mut entries = Vec::new();
    for item in fs::read_dir(&dir)? {
        let item = item?;
        if !item.metadata()?.is_file() {
            continue;
        }
        let name = item
            .file_name()
            .into_string()
            .map_err(|_| io::Error::other("non-UTF-8 file name"))?;
        entries.push((name, fs::read(item.path())?));
    }
    // Pack in name order so rebuilding the same directory is stable.
    entries.sort();

    let mut builder = ImageBuilder::new();
    for (name, contents) in &entries {
        builder = builder.file(name, contents);
    }
    let image = builder.build().map_err(io::Error::other)?;

    fs::write(&out, &image)?;
    eprintln!(
        "packed {} files into {out} ({} bytes)",
        entries.len(),
        image.len()
    );
    Ok(())
}
