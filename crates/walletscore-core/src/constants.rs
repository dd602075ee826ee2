//! Scoring constants. Scores are integers in `[CREDIT_SCORE_MIN, CREDIT_SCORE_MAX]`.

/// Lowest score any wallet can receive.
pub const CREDIT_SCORE_MIN: u16 = 300;

/// Highest score any wallet can receive.
pub const CREDIT_SCORE_MAX: u16 = 850;

/// Number of numeric columns in a wallet feature vector.
pub const FEATURE_COUNT: usize = 18;

/// Number of clusters the population is partitioned into. Equal to the
/// number of score bands so the cluster→band mapping is a bijection.
pub const CLUSTER_COUNT: usize = 5;

/// Per-position health factors at or above this value are treated as unbounded.
pub const UNBOUNDED_HEALTH_FACTOR: f64 = 1e6;

/// Wei per ether, used to convert raw transaction values.
pub const WEI_PER_ETH: f64 = 1e18;

/// Floor applied to non-positive values before `log1p`.
pub const DEFAULT_EPSILON: f64 = 1e-6;

/// Health factor substituted for an exact zero (no debt reported).
pub const NEUTRAL_HEALTH_FACTOR: f64 = 1.0;

/// Prefix of every synthetic exemplar identifier.
pub const SYNTHETIC_WALLET_MARKER: &str = "0x000000000000syntheticwallet";

/// Substring used to recognise synthetic identifiers.
pub const SYNTHETIC_TAG: &str = "synthetic";

/// Decoded method labels that indicate a debt repayment.
pub const REPAY_METHODS: &[&str] = &[
    "repay",
    "repayborrow",
    "repayWithPermit",
    "repayBorrowBehalf",
    "paybackDebt",
    "burnSynths",
    "repayDebt",
    "repayLoan",
    "repayTroves",
    "repayStableDebt",
    "repayVariableDebt",
    "repayFor",
    "repayCollateralizedDebt",
];

/// Decoded method labels that indicate a liquidation.
pub const LIQUIDATE_METHODS: &[&str] = &[
    "liquidationCall",
    "liquidateBorrow",
    "liquidate",
    "liquidateDelinquentAccount",
    "liquidateTroves",
    "liquidatePosition",
    "bite",
    "redeemCollateral",
    "adjustTrove",
    "closeTrove",
    "seize",
    "forceClosePosition",
    "liquidateAccount",
];

/// Decoded method labels that count as lending/borrowing engagement.
pub const HISTORY_METHODS: &[&str] = &[
    "deposit",
    "supply",
    "withdraw",
    "borrow",
    "repay",
    "repayborrow",
    "flashLoan",
    "flash",
    "swapBorrowRateMode",
    "setUserUseReserveAsCollateral",
    "configureReserveAsCollateral",
    "setCollateralConfiguration",
    "approveDelegation",
    "delegateCredit",
    "lockCollateral",
    "freeCollateral",
    "enterMarkets",
    "exitMarket",
    "mint",
    "redeem",
    "redeemUnderlying",
    "increaseAllowance",
    "repayWithPermit",
    "liquidationCall",
    "liquidateBorrow",
    "liquidate",
    "repayBorrowBehalf",
    "generateDebt",
    "paybackDebt",
    "swap",
    "swapExactTokensForTokens",
    "flashMint",
    "collateralSwap",
    "addLiquidity",
    "removeLiquidity",
];

/// Swap event types counted towards the token swap feature.
pub const SWAP_TRANSACTION_TYPES: &[&str] = &["buy", "sell"];
