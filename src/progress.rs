use std::io;
use std::io::Write;
use std::time;


pub trait ProgressSink {
	fn update(&mut self, inow: usize);
	fn finish(self, inow: Option<usize>);
}


pub struct ProgressMeter {
	t0: time::Instant,
	n: Option<usize>,
}

impl ProgressMeter {
	pub fn start(n: Option<usize>) -> Self {
		let meter = Self{
			t0: time::Instant::now(),
			n,
		};
		meter.render(0, false);
		meter
	}

	fn render(&self, inow: usize, done: bool) {
		let dt = (time::Instant::now() - self.t0).as_secs_f64();
		let rate = if dt > 0.0 {
			inow as f64 / dt
		} else {
			0.0
		};
		match self.n {
			Some(n) => {
				let percent = if n > 0 {
					inow as f64 / n as f64 * 100.0
				} else {
					100.0
				};
				print!("{:6.0}% [{:6.2}/s]\r", percent, rate);
			},
			None => {
				print!("{:12} [{:6.2}/s]\r", inow, rate);
			},
		}
		if done {
			println!();
		} else {
			io::stdout().flush().unwrap();
		}
	}
}

impl ProgressSink for ProgressMeter {
	fn update(&mut self, inow: usize) {
		self.render(inow, false);
	}

	fn finish(self, inow: Option<usize>) {
		let inow = inow.or(self.n).unwrap_or(0);
		self.render(inow, true);
	}
}
