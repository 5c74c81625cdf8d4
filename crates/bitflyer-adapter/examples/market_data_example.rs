/*
[INPUT]:  Product code (e.g., "BTC_JPY")
[OUTPUT]: Market data (markets, board, ticker, executions, exchange status)
[POS]:    Examples - public market data queries
[UPDATE]: When adding new market data endpoints
*/

use bitflyer_adapter::*;

/// Example: Query market data (no authentication required)
#[tokio::main]
async fn main() {
    println!("=== bitFlyer Market Data Example ===\n");

    let client = match BitflyerClient::new() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to create client: {}", e);
            return;
        }
    };
    println!("✓ HTTP client created (no auth required for public endpoints)\n");

    let product = ProductCode::from("BTC_JPY");

    println!("Querying markets...");
    match client.get_markets().await {
        Ok(markets) => println!("✓ {} markets", markets.len()),
        Err(e) => println!("✗ Error: {}", e),
    }

    println!("\nQuerying board for {}...", product);
    match client.get_board(&product).await {
        Ok(board) => println!(
            "✓ mid {} best bid {:?} best ask {:?}",
            board.mid_price,
            board.best_bid(),
            board.best_ask()
        ),
        Err(e) => println!("✗ Error: {}", e),
    }

    println!("\nQuerying ticker for {}...", product);
    match client.get_ticker(&product).await {
        Ok(ticker) => println!("✓ ltp {} volume {}", ticker.ltp, ticker.volume),
        Err(e) => println!("✗ Error: {}", e),
    }

    println!("\nQuerying last 5 executions for {}...", product);
    let pagination = Pagination {
        count: Some(5),
        ..Pagination::default()
    };
    match client.get_executions(&product, pagination).await {
        Ok(executions) => {
            for execution in executions {
                println!("  {} {} @ {}", execution.side, execution.size, execution.price);
            }
        }
        Err(e) => println!("✗ Error: {}", e),
    }

    println!("\nQuerying exchange status for {}...", product);
    match client.get_board_state(&product).await {
        Ok(state) => println!("✓ health {} state {}", state.health, state.state),
        Err(e) => println!("✗ Error: {}", e),
    }

    println!("\n✓ Market data example complete");
}
