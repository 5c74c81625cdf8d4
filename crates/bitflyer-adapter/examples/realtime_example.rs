/*
[INPUT]:  Product code and stream kind
[OUTPUT]: Live merged order book and ticker updates printed to stdout
[POS]:    Examples - realtime subscriptions
[UPDATE]: When realtime facade API changes
*/

use std::sync::Arc;
use std::time::Duration;

use bitflyer_adapter::*;

/// Example: stream a merged order book and ticker for 30 seconds
#[tokio::main]
async fn main() {
    println!("=== bitFlyer Realtime Example ===\n");

    let rest = match BitflyerClient::new() {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("Failed to create client: {}", e);
            return;
        }
    };
    let realtime = RealtimeClient::new(RealtimeConfig::default()).with_rest_client(rest);
    let product = ProductCode::from("FX_BTC_JPY");

    let result = realtime
        .start_board(product.clone(), true, |product, board| {
            println!(
                "[{}] board mid {} bids {} asks {} best {:?}/{:?}",
                product,
                board.mid_price,
                board.bids.len(),
                board.asks.len(),
                board.best_bid().map(|l| l.price),
                board.best_ask().map(|l| l.price),
            );
        })
        .await;
    if let Err(e) = result {
        eprintln!("✗ Failed to start board: {}", e);
        return;
    }

    if let Err(e) = realtime
        .start_ticker(product.clone(), |product, ticker| {
            println!("[{}] ticker ltp {}", product, ticker.ltp);
        })
        .await
    {
        eprintln!("✗ Failed to start ticker: {}", e);
    }

    tokio::time::sleep(Duration::from_secs(30)).await;

    realtime.stop_all().await;
    println!("\n✓ Realtime example complete");
}
