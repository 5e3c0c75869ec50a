/// Binance spot & USD-M futures kline integration: endpoints, wire models and the REST
/// client used for backfill and symbol selection.
pub mod binance;
