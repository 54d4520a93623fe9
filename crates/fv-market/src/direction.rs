use fv_core::{Direction, Price};

/// Direction of a theoretical quote against the exchange quote.
///
/// - `Buy`: an ask theoretical is present and `0 < exchange_ask < t_ask`
/// - `Sell`: a bid theoretical is present and `exchange_bid > 0` and
///   `exchange_bid > t_bid`
/// - `None`: both hold (conflicting) or neither holds
///
/// All prices are compared in whole cents, truncated toward zero.
pub fn compute_direction(
    t_bid: Option<Price>,
    t_ask: Option<Price>,
    exchange_bid: Price,
    exchange_ask: Price,
) -> Direction {
    let exchange_bid = exchange_bid.whole();
    let exchange_ask = exchange_ask.whole();

    let buy_edge = t_ask
        .map(|t| exchange_ask.is_positive() && exchange_ask < t.whole())
        .unwrap_or(false);
    let sell_edge = t_bid
        .map(|t| exchange_bid.is_positive() && exchange_bid > t.whole())
        .unwrap_or(false);

    match (buy_edge, sell_edge) {
        (true, false) => Direction::Buy,
        (false, true) => Direction::Sell,
        _ => Direction::None,
    }
}
