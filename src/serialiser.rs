use crate::cue::{Cue, CueList};

use std::io::{BufWriter, Write};

use anyhow::{Context, Result};

/// Write `cues` as a WebVTT document.
pub fn serialise<W: Write>(cues: &CueList, dst: W) -> Result<()> {
    let mut writer = BufWriter::new(dst);
    write_cues(&mut writer, cues).context("Failed to write captions.")?;
    writer.flush().context("Failed to write captions.")?;
    Ok(())
}

fn write_cues<W: Write>(buf: &mut W, cues: &CueList) -> Result<()> {
    writeln!(buf, "WEBVTT")?;
    writeln!(buf)?;
    for cue in cues {
        write_cue(buf, cue)?;
    }
    Ok(())
}

fn write_cue<W: Write>(buf: &mut W, cue: &Cue) -> Result<()> {
    write_ts(buf, cue.start)?;
    write!(buf, " --> ")?;
    write_ts(buf, cue.end)?;
    writeln!(buf)?;
    for line in cue.text.lines() {
        writeln!(buf, "{}", line)?;
    }
    writeln!(buf)?;
    Ok(())
}

pub(crate) fn write_ts<W: Write>(buf: &mut W, seconds: f64) -> Result<()> {
    let total_millis = (seconds.max(0.0) * 1000.0).round() as u64;
    let total_secs = total_millis / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let secs = total_secs % 60;
    let millis = total_millis % 1000;
    write!(buf, "{:02}:{:02}:{:02}.{:03}", hours, minutes, secs, millis)?;
    Ok(())
}
