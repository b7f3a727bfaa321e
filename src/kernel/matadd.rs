use anyhow::{ensure, Result};
use log::debug;

use crate::isa::assemble;
use crate::kernel::kernel::Kernel;
use crate::memory::{DataLayout, Memory};
use crate::util::MEM_WORDS;

#[derive(Debug, Clone)]
pub struct MatAddConfig {
    pub a: Vec<u8>,
    pub b: Vec<u8>,
}

/// Element-wise `C[i] = A[i] + B[i]` with one thread per element, indexed by
/// `%blockIdx * %blockDim + %threadIdx`.
pub struct MatAdd {
    pub config: MatAddConfig,
    pub layout: DataLayout,
}

impl MatAdd {
    pub fn new(config: MatAddConfig) -> Result<Self> {
        ensure!(
            config.a.len() == config.b.len(),
            "operand lengths differ: {} vs {}",
            config.a.len(),
            config.b.len()
        );
        // a, b and c side by side in data memory
        ensure!(
            !config.a.is_empty() && 3 * config.a.len() <= MEM_WORDS,
            "matadd needs 1..={} elements, got {}",
            MEM_WORDS / 3,
            config.a.len()
        );
        let n = config.a.len();
        let mut layout = DataLayout::new(n);
        layout.alloc("a", n)?;
        layout.alloc("b", n)?;
        layout.alloc("c", n)?;
        Ok(MatAdd { config, layout })
    }

    fn base(&self, id: &str) -> u8 {
        self.layout.get_addr(id).unwrap_or_default()
    }

    pub fn expected(&self) -> Vec<u8> {
        self.config
            .a
            .iter()
            .zip(self.config.b.iter())
            .map(|(a, b)| a.wrapping_add(*b))
            .collect()
    }
}

impl Kernel for MatAdd {
    fn program(&self) -> Result<Vec<u16>> {
        assemble(&format!(
            "
            MUL R0, %blockIdx, %blockDim
            ADD R0, R0, %threadIdx         ; i = blockIdx * blockDim + threadIdx
            CONST R1, #{a}                 ; baseA
            CONST R2, #{b}                 ; baseB
            CONST R3, #{c}                 ; baseC
            ADD R4, R1, R0                 ; addr(A[i])
            LDR R4, R4                     ; load A[i]
            ADD R5, R2, R0                 ; addr(B[i])
            LDR R5, R5                     ; load B[i]
            ADD R6, R4, R5                 ; C[i] = A[i] + B[i]
            ADD R7, R3, R0                 ; addr(C[i])
            STR R7, R6                     ; store C[i]
            RET
            ",
            a = self.base("a"),
            b = self.base("b"),
            c = self.base("c"),
        ))
    }

    fn data(&self) -> Result<Vec<(u8, Vec<u8>)>> {
        Ok(vec![
            (self.base("a"), self.config.a.clone()),
            (self.base("b"), self.config.b.clone()),
        ])
    }

    fn thread_count(&self) -> u8 {
        self.config.a.len() as u8
    }

    fn check(&self, data: &Memory<u8>) -> Result<()> {
        let expected = self.expected();
        let got = data.dump(self.base("c") as usize, expected.len());
        ensure!(got == expected.as_slice(), "matadd mismatch: got {:?}, expected {:?}", got, expected);
        Ok(())
    }

    fn get_kernel_type(&self) -> String {
        String::from("MatAdd")
    }

    fn log(&self) {
        debug!("Kernel config: {:?}", self.config);
    }
}
