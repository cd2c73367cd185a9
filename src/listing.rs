//! `ls -l`-compatible listing output.
//!
//! Lines follow the historic format clients parse:
//! `<perms> <nlink>\tftp ftp <size>\t<mmm dd HH:MM> <name>`, CRLF-terminated,
//! with symlink targets appended as ` -> <target>`. Timestamps are always
//! UTC `%b %d %H:%M`, whatever the file's age. Names and targets are written
//! as raw bytes so non-UTF-8 filenames survive.

use jiff::Timestamp;

use std::ffi::OsStr;
use std::fs::{self, FileType, Metadata};
use std::io::{self, Write};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::path::Path;
use std::time::SystemTime;

/// List a directory. `detailed` selects full lines (LIST, STAT) over bare
/// names (NLST). `.` and `..` are never listed.
pub fn write_dir<W: Write>(out: &mut W, dir: &Path, detailed: bool) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let Ok(entry) = entry else { break };
        let name = entry.file_name();
        if detailed {
            let path = dir.join(&name);
            // An entry that vanished between readdir and lstat ends the
            // listing at that point.
            let Ok(meta) = fs::symlink_metadata(&path) else {
                break;
            };
            write_entry(out, &path, &name, Some(&meta))?;
        } else {
            write_entry(out, &entry.path(), &name, None)?;
        }
    }
    Ok(())
}

/// Write one listing line. With metadata the full `ls -l` form is produced;
/// without it, just the name.
pub fn write_entry<W: Write>(
    out: &mut W,
    path: &Path,
    name: &OsStr,
    meta: Option<&Metadata>,
) -> io::Result<()> {
    match meta {
        Some(meta) => {
            let perms = permission_glyphs(meta.file_type(), meta.mode());
            let mtime = format_mtime(meta.modified().unwrap_or(SystemTime::UNIX_EPOCH));
            write!(
                out,
                "{} {}\tftp ftp {}\t{} ",
                perms,
                meta.nlink(),
                meta.len(),
                mtime
            )?;
            out.write_all(name.as_bytes())?;
            if meta.file_type().is_symlink()
                && let Ok(target) = fs::read_link(path)
            {
                out.write_all(b" -> ")?;
                out.write_all(target.as_os_str().as_bytes())?;
            }
        }
        None => out.write_all(name.as_bytes())?,
    }
    out.write_all(b"\r\n")
}

/// The ten-glyph permission column: a type glyph followed by the nine `rwx`
/// slots.
pub fn permission_glyphs(file_type: FileType, mode: u32) -> String {
    let mut glyphs = String::with_capacity(10);
    glyphs.push(type_glyph(file_type));
    for glyph in permission_bits(mode) {
        glyphs.push(glyph as char);
    }
    glyphs
}

fn type_glyph(file_type: FileType) -> char {
    if file_type.is_symlink() {
        'l'
    } else if file_type.is_file() {
        '-'
    } else if file_type.is_dir() {
        'd'
    } else if file_type.is_fifo() {
        'p'
    } else if file_type.is_socket() {
        's'
    } else if file_type.is_char_device() {
        'c'
    } else if file_type.is_block_device() {
        'b'
    } else {
        '?'
    }
}

/// The nine `rwx` slots, with setuid/setgid folded onto the owner/group
/// execute slot (`s` when executable, `S` otherwise) and the sticky bit onto
/// other-execute (`t`/`T`).
fn permission_bits(mode: u32) -> [u8; 9] {
    const SLOTS: [(u32, u8); 9] = [
        (0o400, b'r'),
        (0o200, b'w'),
        (0o100, b'x'),
        (0o040, b'r'),
        (0o020, b'w'),
        (0o010, b'x'),
        (0o004, b'r'),
        (0o002, b'w'),
        (0o001, b'x'),
    ];

    let mut bits = [b'-'; 9];
    for (slot, (bit, glyph)) in SLOTS.iter().enumerate() {
        if mode & bit != 0 {
            bits[slot] = *glyph;
        }
    }
    if mode & 0o4000 != 0 {
        bits[2] = if bits[2] == b'x' { b's' } else { b'S' };
    }
    if mode & 0o2000 != 0 {
        bits[5] = if bits[5] == b'x' { b's' } else { b'S' };
    }
    if mode & 0o1000 != 0 {
        bits[8] = if bits[8] == b'x' { b't' } else { b'T' };
    }
    bits
}

/// UTC `%b %d %H:%M`, the one format emitted regardless of file age.
pub fn format_mtime(mtime: SystemTime) -> String {
    let ts = Timestamp::try_from(mtime).unwrap_or(Timestamp::UNIX_EPOCH);
    ts.strftime("%b %d %H:%M").to_string()
}
