//! Print the tile plan for one viewer.

use serde::Serialize;
use vidmix_frame::Size;
use vidmix_mixer::layout::{calc_rows, plan, Blit, Participant, Tile, View};

#[derive(Serialize)]
struct LayoutReport {
    size: Size,
    view: View,
    visible: u32,
    rows: u32,
    tiles: Vec<Tile>,
}

#[allow(clippy::too_many_arguments)]
pub fn run(
    participants: u32,
    width: u32,
    height: u32,
    viewer: u32,
    selfview: bool,
    content: Vec<u32>,
    content_hide: bool,
    focus: Option<u32>,
    focus_full: bool,
    json: bool,
) -> anyhow::Result<()> {
    if width == 0 || height == 0 {
        anyhow::bail!("Composite size must be non-zero, got {width}x{height}");
    }

    let size = Size::new(width, height);
    let members: Vec<Participant> = (1..=participants)
        .map(|pidx| Participant {
            pidx,
            content: content.contains(&pidx),
        })
        .collect();

    let view = View {
        pidx: viewer,
        selfview,
        content_hide,
        focus,
        focus_full,
    };

    let visible = members.iter().filter(|p| view.is_visible(p)).count() as u32;
    let report = LayoutReport {
        size,
        view,
        visible,
        rows: calc_rows(visible),
        tiles: plan(size, &view, &members),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Composite: {size} for viewer {viewer}");
    println!("  Visible: {} ({} rows)", report.visible, report.rows);
    if let Some(target) = focus {
        println!("  Focus: {target}{}", if focus_full { " (full)" } else { "" });
    }
    println!();

    if report.tiles.is_empty() {
        println!("No tiles: the composite stays black");
        return Ok(());
    }

    println!("Tiles (drawing order):");
    for tile in &report.tiles {
        let mode = match tile.blit {
            Blit::Full => "full",
            Blit::Fit(_) => "fit",
            Blit::Crop(_) => "crop",
        };
        println!("  #{:<4} {:<5} {}", tile.pidx, mode, tile.blit.rect(size));
    }

    let dropped = report.visible as usize - report.tiles.len();
    if dropped > 0 {
        println!();
        println!("{dropped} participant(s) did not fit");
    }

    Ok(())
}
