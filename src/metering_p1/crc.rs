use crc16::{CrcType, State, ARC};

/// Running CRC16 register fed one byte at a time while a telegram is framed.
///
/// P1 meters use CRC-16/IBM (reflected polynomial 0xA001, seed 0x0000) which the `crc16`
/// crate names `ARC`. Any other `CrcType` can be plugged in for meters that deviate.
pub struct Crc16<T: CrcType = ARC> {
    state: State<T>,
}

impl<T: CrcType> Crc16<T> {
    pub fn new() -> Self {
        return Crc16 { state: State::<T>::new() };
    }

    /// Resets the register to the algorithm seed
    pub fn initialize(&mut self) {
        self.state = State::<T>::new();
    }

    pub fn process_byte(&mut self, byte: u8) {
        self.state.update(&[byte]);
    }

    pub fn current_code(&self) -> u16 {
        return self.state.get();
    }
}

impl<T: CrcType> Default for Crc16<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crc16::MODBUS;

    #[test]
    fn test_check_value() {
        let mut crc: Crc16 = Crc16::new();
        for b in b"123456789" {
            crc.process_byte(*b);
        }
        assert_eq!(crc.current_code(), 0xBB3D);
    }

    #[test]
    fn test_initialize_restores_seed() {
        let mut crc: Crc16 = Crc16::new();
        assert_eq!(crc.current_code(), 0x0000);
        crc.process_byte(b'/');
        assert_ne!(crc.current_code(), 0x0000);
        crc.initialize();
        assert_eq!(crc.current_code(), 0x0000);
    }

    #[test]
    fn test_other_polynomial() {
        let mut crc: Crc16<MODBUS> = Crc16::new();
        for b in b"123456789" {
            crc.process_byte(*b);
        }
        assert_eq!(crc.current_code(), 0x4B37);
    }

    #[test]
    fn test_p1_frame() {
        let mut crc: Crc16 = Crc16::new();
        for b in b"/ISk5\\2MT382-1000\r\n\r\n1-0:1.8.1(00123.456*kWh)\r\n!" {
            crc.process_byte(*b);
        }
        assert_eq!(crc.current_code(), 0x7399);
    }
}
