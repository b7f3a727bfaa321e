use anyhow::{ensure, Result};
use log::debug;

use crate::isa::assemble;
use crate::kernel::kernel::Kernel;
use crate::memory::{DataLayout, Memory};

#[derive(Debug, Clone)]
pub struct MatMulConfig {
    pub n: usize, // square matrices, row major
    pub a: Vec<u8>,
    pub b: Vec<u8>,
}

/// `C = A x B` for N x N matrices, one thread per output element, looping
/// over `k` with CMP/BRn.
pub struct MatMul {
    pub config: MatMulConfig,
    pub layout: DataLayout,
}

impl MatMul {
    pub fn new(config: MatMulConfig) -> Result<Self> {
        let n = config.n;
        ensure!(n > 0 && n * n <= u8::MAX as usize, "unsupported matrix size {}", n);
        ensure!(
            config.a.len() == n * n && config.b.len() == n * n,
            "operands must hold {} elements",
            n * n
        );
        let mut layout = DataLayout::new(1);
        layout.alloc("a", n * n)?;
        layout.alloc("b", n * n)?;
        layout.alloc("c", n * n)?;
        Ok(MatMul { config, layout })
    }

    fn base(&self, id: &str) -> u8 {
        self.layout.get_addr(id).unwrap_or_default()
    }

    pub fn expected(&self) -> Vec<u8> {
        let n = self.config.n;
        let (a, b) = (&self.config.a, &self.config.b);
        (0..n * n)
            .map(|i| {
                let (row, col) = (i / n, i % n);
                (0..n).fold(0u8, |acc, k| {
                    acc.wrapping_add(a[row * n + k].wrapping_mul(b[k * n + col]))
                })
            })
            .collect()
    }
}

impl Kernel for MatMul {
    fn program(&self) -> Result<Vec<u16>> {
        assemble(&format!(
            "
            MUL R0, %blockIdx, %blockDim
            ADD R0, R0, %threadIdx         ; i = blockIdx * blockDim + threadIdx
            CONST R1, #1                   ; increment
            CONST R2, #{n}                 ; N (matrix inner dimension)
            CONST R3, #{a}                 ; baseA
            CONST R4, #{b}                 ; baseB
            CONST R5, #{c}                 ; baseC
            DIV R6, R0, R2                 ; row = i // N
            MUL R7, R6, R2
            SUB R7, R0, R7                 ; col = i % N
            CONST R8, #0                   ; acc = 0
            CONST R9, #0                   ; k = 0
        LOOP:
            MUL R10, R6, R2
            ADD R10, R10, R9
            ADD R10, R10, R3               ; addr(A[i]) = row * N + k + baseA
            LDR R10, R10                   ; load A[i]
            MUL R11, R9, R2
            ADD R11, R11, R7
            ADD R11, R11, R4               ; addr(B[i]) = k * N + col + baseB
            LDR R11, R11                   ; load B[i]
            MUL R12, R10, R11
            ADD R8, R8, R12                ; acc = acc + A[i] * B[i]
            ADD R9, R9, R1                 ; increment k
            CMP R9, R2
            BRn LOOP                       ; loop while k < N
            ADD R9, R5, R0                 ; addr(C[i]) = baseC + i
            STR R9, R8                     ; store C[i]
            RET
            ",
            n = self.config.n,
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
        (self.config.n * self.config.n) as u8
    }

    fn check(&self, data: &Memory<u8>) -> Result<()> {
        let expected = self.expected();
        let got = data.dump(self.base("c") as usize, expected.len());
        ensure!(got == expected.as_slice(), "matmul mismatch: got {:?}, expected {:?}", got, expected);
        Ok(())
    }

    fn get_kernel_type(&self) -> String {
        String::from("MatMul")
    }

    fn log(&self) {
        debug!("Kernel config: {:?}", self.config);
    }
}
