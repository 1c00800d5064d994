//! # Watch Subcommand
//!
//! Live occupancy board: spawns the synchronizer and re-renders on every
//! change until Ctrl-C. Dropping the view on the way out tears down both
//! change-feed subscriptions.

use anyhow::Result;

use aseo_occupancy::LiveView;
use aseo_store::{ChangeFeed, FacilityRegistry, UsageLog};

use crate::render::render_board;

/// Clear the terminal and draw the board.
fn draw(view: &LiveView) {
    let board = view.board();
    print!("\x1B[2J\x1B[1;1H");
    print!("{}", render_board(&board.facilities, board.usage_today));
    println!();
    println!("watching (Ctrl-C to quit)");
}

pub async fn run<S>(store: S) -> Result<()>
where
    S: FacilityRegistry + UsageLog + ChangeFeed + Send + Sync + 'static,
{
    let mut view = LiveView::spawn(store).await?;
    draw(&view);

    loop {
        tokio::select! {
            changed = view.changed() => {
                if !changed {
                    tracing::warn!("change feed ended");
                    break;
                }
                draw(&view);
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}
