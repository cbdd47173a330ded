//! Register access port: the only path to the hardware register set.

use core::result::Result as CoreResult;
use embassy_time::{with_timeout, Duration};
use embedded_hal_async::i2c::I2c;

use super::types::BusError;

/// Byte-wide register access. Each call is one atomic, possibly slow,
/// possibly failing bus operation.
#[allow(async_fn_in_trait)]
pub trait RegisterPort {
    type Error: core::fmt::Debug;

    async fn read(&mut self, reg: u8) -> CoreResult<u8, Self::Error>;

    async fn write(&mut self, reg: u8, val: u8) -> CoreResult<(), Self::Error>;

    /// Replace the bits selected by `mask` with those of `val`.
    async fn update(&mut self, reg: u8, val: u8, mask: u8) -> CoreResult<(), Self::Error> {
        let old = self.read(reg).await?;
        let new = (old & !mask) | (val & mask);
        if new == old {
            return Ok(());
        }
        self.write(reg, new).await
    }
}

const I2C_OP_TIMEOUT: Duration = Duration::from_millis(30);

/// Run the provided future with a short I2C operation timeout.
async fn with_i2c_timeout<F, T, E>(fut: F) -> CoreResult<T, BusError<E>>
where
    F: core::future::Future<Output = CoreResult<T, BusError<E>>>,
{
    match with_timeout(I2C_OP_TIMEOUT, fut).await {
        Ok(r) => r,
        Err(_) => Err(BusError::Timeout),
    }
}

/// `RegisterPort` over an async I2C device.
pub struct I2cRegisterPort<I2C> {
    i2c: I2C,
    addr: u8,
}

impl<I2C> I2cRegisterPort<I2C> {
    /// Create a port using the default 7-bit I2C address.
    pub fn new(i2c: I2C) -> Self {
        Self { i2c, addr: super::regs::I2C_ADDR }
    }

    pub fn with_address(i2c: I2C, addr: u8) -> Self {
        Self { i2c, addr }
    }

    /// Consume the port and return the owned I2C device.
    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C: I2c> RegisterPort for I2cRegisterPort<I2C> {
    type Error = BusError<I2C::Error>;

    async fn read(&mut self, reg: u8) -> CoreResult<u8, Self::Error> {
        with_i2c_timeout(async {
            let mut buf = [0u8; 1];
            self.i2c
                .write_read(self.addr, &[reg], &mut buf)
                .await
                .map_err(BusError::I2c)?;
            Ok(buf[0])
        })
        .await
    }

    async fn write(&mut self, reg: u8, val: u8) -> CoreResult<(), Self::Error> {
        with_i2c_timeout(async {
            self.i2c
                .write(self.addr, &[reg, val])
                .await
                .map_err(BusError::I2c)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;
    use embedded_hal_async::i2c::{ErrorKind, ErrorType, Operation, SevenBitAddress};

    /// Register file behind a fake I2C bus.
    struct FakeBus {
        regs: [u8; 256],
        last_addr: u8,
    }

    impl ErrorType for FakeBus {
        type Error = ErrorKind;
    }

    impl I2c<SevenBitAddress> for FakeBus {
        async fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> CoreResult<(), Self::Error> {
            self.last_addr = address;
            let mut ptr = 0usize;
            for op in operations {
                match op {
                    Operation::Write(bytes) => {
                        ptr = bytes[0] as usize;
                        for (i, b) in bytes[1..].iter().enumerate() {
                            self.regs[ptr + i] = *b;
                        }
                    }
                    Operation::Read(buf) => {
                        for (i, b) in buf.iter_mut().enumerate() {
                            *b = self.regs[ptr + i];
                        }
                    }
                }
            }
            Ok(())
        }
    }

    #[test]
    fn update_touches_only_masked_bits() {
        let mut port = I2cRegisterPort::new(FakeBus { regs: [0; 256], last_addr: 0 });
        block_on(async {
            port.write(0xB7, 0b1011_0101).await.unwrap();
            port.update(0xB7, 0x0A, 0x0F).await.unwrap();
            assert_eq!(port.read(0xB7).await.unwrap(), 0b1011_1010);
        });
        assert_eq!(port.release().last_addr, super::super::regs::I2C_ADDR);
    }
}
