use std::sync::Arc;

use ferry::{Cannon, Error, Image, Limits, Registry, Result, harness};
use log::{error, info};

use crate::dispatch::{self, OPERATIONS, Op};

/// Runs operations in order against an image stack.
pub struct Pipeline<C: Cannon> {
    cannon: C,
    registry: Arc<Registry>,
    limits: Limits,
    stack: Vec<Image>,
}

impl<C: Cannon> Pipeline<C> {
    pub fn new(cannon: C, registry: Arc<Registry>, limits: Limits) -> Self {
        Self {
            cannon,
            registry,
            limits,
            stack: Vec::new(),
        }
    }

    pub fn stack(&self) -> &[Image] {
        &self.stack
    }

    fn top(&self, op: &str) -> Result<&Image> {
        self.stack
            .last()
            .ok_or_else(|| Error::argument(format!("{op} needs an image on the stack")))
    }

    pub async fn run(&mut self, ops: &[Op]) -> Result<()> {
        for op in ops {
            self.step(op).await?;
        }
        Ok(())
    }

    async fn step(&mut self, op: &Op) -> Result<()> {
        match op {
            Op::Help(None) => {
                println!("Operations available are:");
                let names: Vec<_> = OPERATIONS.iter().map(|(name, _)| *name).collect();
                println!("{}", names.join(" "));
            }
            Op::Help(Some(name)) => match dispatch::help_for(name) {
                Some(help) => println!("{help}"),
                None => return Err(Error::argument(format!("no operation named {name}"))),
            },
            Op::Test => {
                let report = harness::run_self_test(&self.registry, &self.limits).await?;
                if !report.passed() {
                    return Err(Error::protocol(format!(
                        "image changed on the way through port {}: {report:?}",
                        report.port
                    )));
                }
                println!("-test: PASS");
            }
            Op::Send(args) => {
                let image = self.top("-send")?;
                self.cannon.shoot(image, &args.host, args.port).await?;
            }
            Op::Receive(args) => {
                let image = self.cannon.catch(args.port).await?;
                self.stack.push(image);
            }
            Op::Loop { count, body } => {
                self.run_loop(*count, body).await?;
            }
            Op::Dup => {
                let image = self.top("-dup")?.clone();
                self.stack.push(image);
            }
            Op::Pop => {
                self.stack
                    .pop()
                    .ok_or_else(|| Error::argument("-pop needs an image on the stack"))?;
            }
            Op::Dimensions => {
                let (w, h, f, c) = self.top("-dimensions")?.dims();
                println!("{w} x {h} x {f} x {c}");
            }
        }
        Ok(())
    }

    /// Returns how many iterations failed with a recoverable error.
    async fn run_loop(&mut self, count: Option<u64>, body: &[Op]) -> Result<u64> {
        let mut failed = 0;
        let mut iteration = 0;
        while count.is_none_or(|n| iteration < n) {
            match Box::pin(self.run(body)).await {
                Ok(()) => {}
                Err(e) if e.is_recoverable() => {
                    error!("Iteration {iteration} failed: {e}");
                    failed += 1;
                }
                Err(e) => return Err(e),
            }
            iteration += 1;
        }
        if failed > 0 {
            info!("{failed} of {iteration} iterations failed");
        }
        Ok(failed)
    }
}
