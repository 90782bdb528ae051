//! Contract interfaces generated with Alloy's `sol!` macro.
//!
//! Only the functions and events the inspector actually reads are declared.
//! Each interface gets type-safe call encoders, return decoders and event
//! structs with compile-time signature hashes.

use alloy::sol;

sol! {
    /// ERC-20 metadata and events.
    interface IERC20 {
        function name() external view returns (string);
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
        function totalSupply() external view returns (uint256);

        event Transfer(address indexed from, address indexed to, uint256 value);
        event Approval(address indexed owner, address indexed spender, uint256 value);
    }
}

sol! {
    /// OpenZeppelin `Ownable`.
    interface IOwnable {
        function owner() external view returns (address);

        event OwnershipTransferred(address indexed previousOwner, address indexed newOwner);
    }
}

sol! {
    /// Uniswap V2 style factory (PancakeSwap V2, SushiSwap, BiSwap, QuickSwap).
    interface IUniswapV2Factory {
        function getPair(address tokenA, address tokenB) external view returns (address pair);

        event PairCreated(address indexed token0, address indexed token1, address pair, uint256 index);
    }
}

sol! {
    /// Uniswap V2 style pair.
    interface IUniswapV2Pair {
        function token0() external view returns (address);
        function token1() external view returns (address);
        function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast);

        event Sync(uint112 reserve0, uint112 reserve1);
        event Mint(address indexed sender, uint256 amount0, uint256 amount1);
    }
}

sol! {
    /// Uniswap V3 style factory (PancakeSwap V3).
    interface IUniswapV3Factory {
        function getPool(address tokenA, address tokenB, uint24 fee) external view returns (address pool);

        event PoolCreated(address indexed token0, address indexed token1, uint24 indexed fee, int24 tickSpacing, address pool);
    }
}

sol! {
    /// Uniswap V3 style pool.
    ///
    /// PancakeSwap V3 widens `feeProtocol` to `uint32`; return data is
    /// decoded without validation so both layouts read the same.
    interface IUniswapV3Pool {
        function token0() external view returns (address);
        function token1() external view returns (address);
        function liquidity() external view returns (uint128);
        function slot0() external view returns (uint160 sqrtPriceX96, int24 tick, uint16 observationIndex, uint16 observationCardinality, uint16 observationCardinalityNext, uint8 feeProtocol, bool unlocked);
    }
}
